//! Domain models, error taxonomy, validation, dependency-graph algorithms,
//! the criteria grammar, feature configuration, identity resolution, and
//! the repository traits implemented by `task-store`. No I/O.

pub mod config;
pub mod criteria;
pub mod dependency;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod validation;

pub use config::FeatureConfig;
pub use error::{Result, TaskError};
pub use models::{
    CompleteOptions, CriteriaValue, Dependency, FeedbackInput, FileRef, NewTask, Notification,
    NotificationKind, Participant, ProgressEntry, SchemaVersion, SuccessCriterion, Task,
    TaskFilter, TaskId, TaskPatch, TaskPriority, TaskStatus,
};
pub use repository::{
    AdoptionSummary, DependencyRepository, FeedbackSummary, MetricsPeriod, MetricsRepository,
    NotificationRepository, ParticipantRepository, SchemaRepository, TaskRepository, TimeSummary,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_constants_are_set() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "task-core");
    }

    #[test]
    fn re_exports_resolve() {
        let status = TaskStatus::Pending;
        assert_eq!(format!("{status}"), "pending");

        let error = TaskError::not_found("abc12345");
        assert!(error.is_not_found());
    }
}
