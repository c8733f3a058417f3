use std::env;
use std::path::{Path, PathBuf};

/// Directory name for all project state, relative to the project root
/// (§6.1): `tasks.db`, `.lock`, `contexts/`, `notes/`, `config.yaml`,
/// `backups/`.
pub const STATE_DIR_NAME: &str = ".task-orchestrator";
pub const DB_FILE_NAME: &str = "tasks.db";

/// Process-level configuration: where state lives and who is running the
/// command. Resolved once per invocation from environment variables and
/// CLI flags (§6.3); never from a config file. Distinct from
/// [`task_core::FeatureConfig`], which is project state persisted as YAML
/// and read/written by the engine itself.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub agent_id: String,
    pub log_level: String,
    /// Relaxes fsync and treats state as ephemeral; tests only (§6.3).
    pub test_mode: bool,
}

impl ProcessConfig {
    /// Resolves the process config from explicit CLI overrides, falling
    /// back to `TM_DB_PATH` / `TM_AGENT_ID` / `TM_TEST_MODE` and finally to
    /// the defaults under `<project_root>/.task-orchestrator`.
    pub fn resolve(
        project_root: Option<PathBuf>,
        db_path_override: Option<PathBuf>,
        log_level_override: Option<String>,
    ) -> Self {
        let project_root = project_root
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let state_dir = project_root.join(STATE_DIR_NAME);

        let db_path = db_path_override
            .or_else(|| env::var("TM_DB_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| state_dir.join(DB_FILE_NAME));

        let agent_id = task_core::identity::resolve_agent_id();

        let log_level = log_level_override
            .or_else(|| env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string());

        let test_mode = env::var("TM_TEST_MODE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        Self { project_root, state_dir, db_path, agent_id, log_level, test_mode }
    }

    pub fn database_url(&self) -> String {
        self.db_path.display().to_string()
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.state_dir.join("backups")
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.state_dir.join("archives")
    }

    pub fn feature_config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }
}

/// Creates the project state directory (and its `contexts`/`notes`
/// subdirectories) if it doesn't already exist. Called by `init` and
/// lazily by every other command, since a missing state dir is not itself
/// an error condition worth rejecting commands over.
pub fn ensure_state_dir(state_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(state_dir)?;
    std::fs::create_dir_all(state_dir.join("contexts"))?;
    std::fs::create_dir_all(state_dir.join("notes"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_state_dir_under_project_root() {
        let cfg = ProcessConfig::resolve(Some(PathBuf::from("/tmp/proj")), None, None);
        assert_eq!(cfg.state_dir, PathBuf::from("/tmp/proj/.task-orchestrator"));
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/proj/.task-orchestrator/tasks.db"));
    }

    #[test]
    fn explicit_db_path_override_wins() {
        let cfg = ProcessConfig::resolve(
            Some(PathBuf::from("/tmp/proj")),
            Some(PathBuf::from("/tmp/elsewhere/custom.db")),
            None,
        );
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/elsewhere/custom.db"));
    }

    #[test]
    fn log_level_defaults_to_info() {
        env::remove_var("RUST_LOG");
        let cfg = ProcessConfig::resolve(Some(PathBuf::from("/tmp/proj")), None, None);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_mode_reads_tm_test_mode_env_var() {
        env::set_var("TM_TEST_MODE", "1");
        let cfg = ProcessConfig::resolve(Some(PathBuf::from("/tmp/proj")), None, None);
        assert!(cfg.test_mode);
        env::remove_var("TM_TEST_MODE");
    }

    #[test]
    fn ensure_state_dir_creates_contexts_and_notes() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join(".task-orchestrator");
        ensure_state_dir(&state_dir).unwrap();
        assert!(state_dir.join("contexts").is_dir());
        assert!(state_dir.join("notes").is_dir());
    }
}
