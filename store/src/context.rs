//! File-based shared/private context persistence (§4.7). Shared context is
//! a per-task YAML document; private notes are per-(task, agent) markdown.
//! Both are append-only and written under the project advisory lock with
//! fsync before release; reads never take the lock.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use task_core::{
    error::{Result, TaskError},
    models::TaskId,
};

use crate::locking::{ProjectLock, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_STALE_GRACE};

pub const DEFAULT_SHARED_BOUND_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_PRIVATE_BOUND_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Progress,
    Update,
    Fix,
    Discovery,
    Sync,
}

/// One structured contribution appended to a shared context document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contribution {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ContributionKind,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discovery {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub impact: Option<String>,
    pub tags: Vec<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncPoint {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// `contexts/<task_id>.yaml` (§4.7, §6.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SharedContext {
    pub global: String,
    pub agents: Vec<Contribution>,
    pub discoveries: Vec<Discovery>,
    pub sync_points: Vec<SyncPoint>,
    /// Unknown top-level keys are preserved, not discarded (§6.4).
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_yaml::Value>,
}

pub struct ContextStore {
    contexts_dir: PathBuf,
    notes_dir: PathBuf,
    lock_path: PathBuf,
    shared_bound: u64,
    private_bound: u64,
}

impl ContextStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            contexts_dir: state_dir.join("contexts"),
            notes_dir: state_dir.join("notes"),
            lock_path: state_dir.join(".lock"),
            shared_bound: DEFAULT_SHARED_BOUND_BYTES,
            private_bound: DEFAULT_PRIVATE_BOUND_BYTES,
        }
    }

    pub fn with_bounds(mut self, shared_bound: u64, private_bound: u64) -> Self {
        self.shared_bound = shared_bound;
        self.private_bound = private_bound;
        self
    }

    fn shared_path(&self, task_id: &TaskId) -> PathBuf {
        self.contexts_dir.join(format!("{}.yaml", task_id.as_str()))
    }

    fn private_path(&self, task_id: &TaskId, agent_id: &str) -> PathBuf {
        self.notes_dir.join(format!("{}_{}.md", task_id.as_str(), agent_id))
    }

    pub fn read_shared(&self, task_id: &TaskId) -> Result<SharedContext> {
        let path = self.shared_path(task_id);
        if !path.exists() {
            return Ok(SharedContext::default());
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| TaskError::Internal(format!("cannot read shared context: {e}")))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| TaskError::Corrupt(format!("shared context YAML corrupt: {e}")))
    }

    pub fn read_private(&self, task_id: &TaskId, agent_id: &str) -> Result<String> {
        let path = self.private_path(task_id, agent_id);
        if !path.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&path).map_err(|e| TaskError::Internal(format!("cannot read private note: {e}")))
    }

    /// Replaces `global` (the only non-append field), takes the advisory
    /// lock, validates the size bound, fsyncs before releasing.
    pub fn set_global(&self, task_id: &TaskId, global: String) -> Result<()> {
        self.mutate_shared(task_id, |ctx| {
            ctx.global = global;
            Ok(())
        })
    }

    pub fn append_contribution(&self, task_id: &TaskId, contribution: Contribution) -> Result<()> {
        self.mutate_shared(task_id, |ctx| {
            ctx.agents.push(contribution);
            Ok(())
        })
    }

    pub fn append_discovery(&self, task_id: &TaskId, discovery: Discovery) -> Result<()> {
        self.mutate_shared(task_id, |ctx| {
            ctx.discoveries.push(discovery);
            Ok(())
        })
    }

    pub fn append_sync_point(&self, task_id: &TaskId, sync_point: SyncPoint) -> Result<()> {
        self.mutate_shared(task_id, |ctx| {
            ctx.sync_points.push(sync_point);
            Ok(())
        })
    }

    fn mutate_shared(&self, task_id: &TaskId, mutate: impl FnOnce(&mut SharedContext) -> Result<()>) -> Result<()> {
        std::fs::create_dir_all(&self.contexts_dir)
            .map_err(|e| TaskError::Internal(format!("cannot create contexts dir: {e}")))?;
        let _lock = ProjectLock::acquire(&self.lock_path, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_STALE_GRACE)?;

        let mut ctx = self.read_shared(task_id)?;
        mutate(&mut ctx)?;
        let encoded = serde_yaml::to_string(&ctx)
            .map_err(|e| TaskError::Internal(format!("shared context encode failed: {e}")))?;

        if encoded.len() as u64 > self.shared_bound {
            return Err(TaskError::SizeExceeded(format!(
                "shared context for {task_id} would exceed {} bytes",
                self.shared_bound
            )));
        }

        write_and_fsync(&self.shared_path(task_id), encoded.as_bytes())
    }

    /// Appends to the per-agent private note. Size is validated against
    /// the bound **before** appending (§4.7); the write never partially
    /// applies.
    pub fn append_private_note(&self, task_id: &TaskId, agent_id: &str, text: &str) -> Result<()> {
        std::fs::create_dir_all(&self.notes_dir)
            .map_err(|e| TaskError::Internal(format!("cannot create notes dir: {e}")))?;
        let _lock = ProjectLock::acquire(&self.lock_path, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_STALE_GRACE)?;

        let path = self.private_path(task_id, agent_id);
        let existing_len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let appended_len = existing_len + text.len() as u64 + 1;
        if appended_len > self.private_bound {
            return Err(TaskError::SizeExceeded(format!(
                "private note for {task_id}/{agent_id} would exceed {} bytes",
                self.private_bound
            )));
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TaskError::Internal(format!("cannot open private note: {e}")))?;
        writeln!(file, "{text}").map_err(|e| TaskError::Internal(format!("private note write failed: {e}")))?;
        file.sync_all().map_err(|e| TaskError::Internal(format!("private note fsync failed: {e}")))?;
        Ok(())
    }
}

fn write_and_fsync(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| TaskError::Internal(format!("cannot open context file: {e}")))?;
    file.write_all(bytes).map_err(|e| TaskError::Internal(format!("context write failed: {e}")))?;
    file.sync_all().map_err(|e| TaskError::Internal(format!("context fsync failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> ContextStore {
        ContextStore::new(dir)
    }

    #[test]
    fn set_global_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = TaskId::from("abc12345");
        store.set_global(&id, "hello".to_string()).unwrap();
        assert_eq!(store.read_shared(&id).unwrap().global, "hello");
    }

    #[test]
    fn append_contribution_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = TaskId::from("abc12345");
        for i in 0..3 {
            store
                .append_contribution(
                    &id,
                    Contribution {
                        agent_id: "agent-a".into(),
                        timestamp: Utc::now(),
                        kind: ContributionKind::Progress,
                        content: format!("step {i}"),
                    },
                )
                .unwrap();
        }
        assert_eq!(store.read_shared(&id).unwrap().agents.len(), 3);
    }

    #[test]
    fn shared_write_over_bound_fails_without_modifying_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path()).with_bounds(64, DEFAULT_PRIVATE_BOUND_BYTES);
        let id = TaskId::from("abc12345");
        let err = store.set_global(&id, "x".repeat(1000)).unwrap_err();
        assert!(matches!(err, TaskError::SizeExceeded(_)));
        assert!(store.read_shared(&id).unwrap().global.is_empty());
    }

    #[test]
    fn private_note_over_bound_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path()).with_bounds(DEFAULT_SHARED_BOUND_BYTES, 10);
        let id = TaskId::from("abc12345");
        let err = store.append_private_note(&id, "agent-a", "this note is too long").unwrap_err();
        assert!(matches!(err, TaskError::SizeExceeded(_)));
    }

    #[test]
    fn private_notes_are_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = TaskId::from("abc12345");
        store.append_private_note(&id, "agent-a", "first").unwrap();
        store.append_private_note(&id, "agent-a", "second").unwrap();
        let contents = store.read_private(&id, "agent-a").unwrap();
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
    }

    #[test]
    fn unknown_top_level_keys_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = TaskId::from("abc12345");
        let path = store.shared_path(&id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "global: ''\nagents: []\ndiscoveries: []\nsync_points: []\nfuture_field: 42\n").unwrap();
        let ctx = store.read_shared(&id).unwrap();
        assert!(ctx.extra.contains_key("future_field"));
    }
}
