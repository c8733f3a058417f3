use std::sync::Arc;

use anyhow::{Context, Result};
use task_core::FeatureConfig;
use task_store::{ContextStore, SqliteStore};
use tracing::info;

use crate::config::{ensure_state_dir, ProcessConfig};
use crate::engine::TaskCore;

/// Everything a command needs to talk to project state: the engine facade
/// plus the raw store/context/feature handles it wraps, kept around for
/// commands (`migrate`, `config`) that bypass the facade.
pub struct Application {
    pub store: Arc<SqliteStore>,
    pub context: ContextStore,
    pub features: FeatureConfig,
    pub process: ProcessConfig,
    core: TaskCore,
}

impl Application {
    pub fn core(&self) -> &TaskCore {
        &self.core
    }
}

/// Opens a SQLite connection at the configured path without applying
/// migrations; used by `taskctl migrate` to inspect or roll back state that
/// a plain `connect` + `migrate` would otherwise advance past.
pub async fn create_store_unmigrated(process: &ProcessConfig) -> Result<Arc<SqliteStore>> {
    ensure_state_dir(&process.state_dir).context("failed to create project state directory")?;
    let store = SqliteStore::connect(&process.database_url()).await.context("failed to open task store")?;
    Ok(Arc::new(store))
}

/// Opens (and migrates) the SQLite store at the configured path, creating
/// the state directory on first use.
pub async fn create_store(process: &ProcessConfig) -> Result<Arc<SqliteStore>> {
    let store = create_store_unmigrated(process).await?;

    info!("applying pending migrations");
    store.migrate(process.backups_dir()).await.context("failed to apply migrations")?;

    Ok(store)
}

/// Builds the full [`Application`]: store, context store, the feature-toggle
/// config loaded from `config.yaml` (defaults if absent), and the engine
/// facade wrapping all three.
pub async fn initialize_app(process: &ProcessConfig) -> Result<Application> {
    let store = create_store(process).await?;
    let context = ContextStore::new(&process.state_dir);
    let features = load_feature_config(process)?;
    let core = TaskCore::new(
        Arc::clone(&store),
        ContextStore::new(&process.state_dir),
        features.clone(),
        process.archives_dir(),
        process.agent_id.clone(),
    );
    Ok(Application { store, context, features, process: process.clone(), core })
}

/// Reads `config.yaml`, falling back to defaults if it doesn't exist yet.
pub fn load_feature_config(process: &ProcessConfig) -> Result<FeatureConfig> {
    let path = process.feature_config_path();
    if !path.exists() {
        return Ok(FeatureConfig::default());
    }
    let contents = std::fs::read_to_string(&path).context("failed to read config.yaml")?;
    FeatureConfig::from_yaml(&contents).context("config.yaml is not valid feature-toggle YAML")
}

/// Persists the feature-toggle config back to `config.yaml`.
pub fn save_feature_config(process: &ProcessConfig, config: &FeatureConfig) -> Result<()> {
    ensure_state_dir(&process.state_dir)?;
    let yaml = config.to_yaml().context("failed to encode feature config")?;
    std::fs::write(process.feature_config_path(), yaml).context("failed to write config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(dir: &std::path::Path) -> ProcessConfig {
        ProcessConfig::resolve(Some(dir.to_path_buf()), None, None)
    }

    #[tokio::test]
    async fn create_store_migrates_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let process = process(dir.path());
        let store = create_store(&process).await.unwrap();
        assert_eq!(store.next_task_id().await.unwrap().as_str().len(), 8);
    }

    #[test]
    fn load_feature_config_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let process = process(dir.path());
        let cfg = load_feature_config(&process).unwrap();
        assert_eq!(cfg, FeatureConfig::default());
    }

    #[test]
    fn save_then_load_feature_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let process = process(dir.path());
        let mut cfg = FeatureConfig::default();
        cfg.enable("success_criteria");
        save_feature_config(&process, &cfg).unwrap();
        let reloaded = load_feature_config(&process).unwrap();
        assert_eq!(reloaded, cfg);
    }
}
