//! Persistence layer for the task-coordination engine.
//!
//! Provides a SQLite-backed implementation of every `task-core` repository
//! trait, a versioned schema migrator with pre-apply backups, an advisory
//! project-wide file lock, and file-based shared/private context storage.
//!
//! # Usage
//!
//! ```no_run
//! use task_store::SqliteStore;
//! use task_core::repository::TaskRepository;
//! use std::path::PathBuf;
//!
//! # async fn run() -> Result<(), task_core::TaskError> {
//! let store = SqliteStore::connect("tasks.db").await?;
//! store.migrate(PathBuf::from("backups")).await?;
//! let task = store.get(&"abc12345".into()).await?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod context;
pub mod locking;
pub mod migrator;
pub mod sqlite;

pub use context::{ContextStore, Contribution, ContributionKind, Discovery, SharedContext, SyncPoint};
pub use locking::ProjectLock;
pub use migrator::{Migration, Migrator, MIGRATIONS};
pub use sqlite::SqliteStore;

pub use task_core::{
    error::{Result, TaskError},
    models::{
        CompleteOptions, Dependency, FeedbackInput, NewTask, Notification, NotificationKind,
        Participant, ProgressEntry, SchemaVersion, Task, TaskFilter, TaskId, TaskPatch,
        TaskPriority, TaskStatus,
    },
    repository::{
        AdoptionSummary, DependencyRepository, FeedbackSummary, MetricsPeriod, MetricsRepository,
        NotificationRepository, ParticipantRepository, SchemaRepository, TaskRepository, TimeSummary,
    },
};
