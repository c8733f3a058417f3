use thiserror::Error;

use crate::models::{TaskPriority, TaskStatus};

/// Result type alias for task-orchestrator operations.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Error taxonomy for the coordination engine.
///
/// Each variant maps to a distinct non-zero CLI exit code via
/// [`TaskError::exit_code`]; the core never swallows an error, and writers
/// roll back their transaction fully on any of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Malformed title, criteria JSON, score out of range, bad ISO-8601, negative hours.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Task id unknown.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Deleting a referenced task, or adding an edge whose endpoint is missing.
    #[error("dependency violation: {0}")]
    DependencyViolation(String),

    /// Proposed edges would form a cycle in the dependency graph.
    #[error("cycle detected: adding {0} -> {1} would create a cycle")]
    CycleDetected(String, String),

    /// Editing a completed task's non-feedback fields, feedback on a
    /// non-completed task, double feedback, or any other state-machine
    /// violation not covered by a more specific variant.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    /// Criteria evaluation returned failures; carries the failing criteria.
    #[error("validation failed: {} criteria not met", .failures.len())]
    ValidationFailed { failures: Vec<String> },

    /// Database contention exceeded the configured busy-timeout.
    #[error("store busy: {0}")]
    StoreBusy(String),

    /// Project advisory lock was not acquired within the configured timeout.
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// Store's schema version is newer than this build understands.
    #[error("schema mismatch: database is at version {found}, this build supports up to {supported}")]
    SchemaMismatch { found: i64, supported: i64 },

    /// A context file write would exceed its configured size bound.
    #[error("size exceeded: {0}")]
    SizeExceeded(String),

    /// Database integrity check failed. Exposed, never auto-repaired.
    #[error("database corrupt: {0}")]
    Corrupt(String),

    /// Last-resort bucket; must carry enough context to diagnose.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TaskError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn dependency_violation(msg: impl Into<String>) -> Self {
        Self::DependencyViolation(msg.into())
    }

    pub fn illegal_transition(msg: impl Into<String>) -> Self {
        Self::IllegalTransition(msg.into())
    }

    pub fn invalid_status_transition(from: TaskStatus, to: TaskStatus) -> Self {
        Self::IllegalTransition(format!("cannot move task from {from} to {to}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound(_))
    }

    pub fn is_validation_failed(&self) -> bool {
        matches!(self, TaskError::ValidationFailed { .. })
    }

    /// Distinct non-zero exit code per error class, used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::InvalidInput(_) => 2,
            TaskError::NotFound(_) => 3,
            TaskError::DependencyViolation(_) => 4,
            TaskError::CycleDetected(_, _) => 5,
            TaskError::IllegalTransition(_) => 6,
            TaskError::ValidationFailed { .. } => 7,
            TaskError::StoreBusy(_) => 8,
            TaskError::LockTimeout(_) => 9,
            TaskError::SchemaMismatch { .. } => 10,
            TaskError::SizeExceeded(_) => 11,
            TaskError::Corrupt(_) => 12,
            TaskError::Internal(_) => 1,
        }
    }
}

/// Ordering used for list/critical-path tie-breaks (§4.4): priority
/// descending, then the caller compares deadline/created_at/id separately.
pub(crate) fn priority_rank(p: TaskPriority) -> u8 {
    match p {
        TaskPriority::Critical => 3,
        TaskPriority::High => 2,
        TaskPriority::Medium => 1,
        TaskPriority::Low => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let variants = vec![
            TaskError::invalid_input("x"),
            TaskError::not_found("abc12345"),
            TaskError::dependency_violation("x"),
            TaskError::CycleDetected("a".into(), "b".into()),
            TaskError::illegal_transition("x"),
            TaskError::ValidationFailed { failures: vec!["x".into()] },
            TaskError::StoreBusy("x".into()),
            TaskError::LockTimeout("x".into()),
            TaskError::SchemaMismatch { found: 2, supported: 1 },
            TaskError::SizeExceeded("x".into()),
            TaskError::Corrupt("x".into()),
            TaskError::Internal("x".into()),
        ];
        let mut codes: Vec<i32> = variants.iter().map(TaskError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), variants.len());
    }

    #[test]
    fn not_found_predicate() {
        assert!(TaskError::not_found("x").is_not_found());
        assert!(!TaskError::invalid_input("x").is_not_found());
    }

    #[test]
    fn priority_rank_orders_critical_highest() {
        assert!(priority_rank(TaskPriority::Critical) > priority_rank(TaskPriority::High));
        assert!(priority_rank(TaskPriority::High) > priority_rank(TaskPriority::Medium));
        assert!(priority_rank(TaskPriority::Medium) > priority_rank(TaskPriority::Low));
    }
}
