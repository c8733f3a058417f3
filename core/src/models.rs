use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque task identifier: 8 lowercase hex characters, assigned at creation.
#[derive(Debug, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A unit of work tracked through the dependency/notification lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub success_criteria: Vec<SuccessCriterion>,
    pub feedback_quality: Option<i32>,
    pub feedback_timeliness: Option<i32>,
    pub feedback_notes: Option<String>,
    pub completion_summary: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub file_refs: Vec<FileRef>,
}

impl Task {
    /// §3 invariant 3: a completed task may only have its feedback fields
    /// touched, and each feedback field may be set at most once.
    pub fn is_locked_except_feedback(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback_quality.is_some() || self.feedback_timeliness.is_some()
    }

    /// §4.4 ordering: priority descending, deadline ascending (nulls last),
    /// created_at ascending, then id lexicographic.
    pub fn ordering_key(&self) -> (std::cmp::Reverse<u8>, i64, DateTime<Utc>, String) {
        let deadline_rank = self.deadline.map(|d| d.timestamp()).unwrap_or(i64::MAX);
        (
            std::cmp::Reverse(crate::error::priority_rank(self.priority)),
            deadline_rank,
            self.created_at,
            self.id.0.clone(),
        )
    }
}

/// §3: one of {pending, in_progress, completed, blocked, cancelled}.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    /// Completed and cancelled tasks no longer gate dependents (§3, §4.5).
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// §3: one of {low, medium, high, critical}; default medium.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A human description paired with a machine-evaluable measurable (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessCriterion {
    pub criterion: String,
    pub measurable: String,
}

/// A reference to a location in a source file, used for impact-review
/// notifications (§4.6) and for `list --file-ref`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FileRef {
    pub path: String,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
}

/// Ordered pair `(task_id, depends_on_task_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub task_id: TaskId,
    pub depends_on: TaskId,
}

/// `(task_id, agent_id, joined_at)`, unique per pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub task_id: TaskId,
    pub agent_id: String,
    pub joined_at: DateTime<Utc>,
}

/// A durable, pull-delivered message describing a state change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    /// `None` means broadcast to every agent.
    pub agent_id: Option<String>,
    pub task_id: Option<TaskId>,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Unblocked,
    Impact,
    Discovery,
    Completed,
    Sync,
    ContextUpdated,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Unblocked => "unblocked",
            NotificationKind::Impact => "impact",
            NotificationKind::Discovery => "discovery",
            NotificationKind::Completed => "completed",
            NotificationKind::Sync => "sync",
            NotificationKind::ContextUpdated => "context_updated",
        };
        write!(f, "{s}")
    }
}

/// `(task_id, timestamp, agent_id, message)`, chronological (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub message: String,
}

/// Monotonic schema version with an applied-at timestamp (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaVersion {
    pub version: i64,
    pub applied_at: DateTime<Utc>,
    pub description: String,
}

/// Input for `TaskCore::add` (§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
    pub created_by: Option<String>,
    pub depends_on: Vec<TaskId>,
    pub file_refs: Vec<FileRef>,
    pub success_criteria: Vec<SuccessCriterion>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
}

/// Patch for `TaskCore::update`; permitted fields depend on current status
/// (§3 invariant 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
}

/// Options for `TaskCore::complete` (§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompleteOptions {
    pub validate: bool,
    pub actual_hours: Option<f64>,
    pub summary: Option<String>,
    pub impact_review: bool,
    pub criteria_context: std::collections::BTreeMap<String, CriteriaValue>,
}

/// A value from the caller-supplied context map fed to the criteria engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CriteriaValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// Feedback payload for `TaskCore::feedback` (§4.4, invariant 5).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedbackInput {
    pub quality: Option<i32>,
    pub timeliness: Option<i32>,
    pub note: Option<String>,
}

/// Filter accepted by `TaskCore::list` (§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub has_deps: Option<bool>,
    pub file_ref_contains: Option<String>,
    pub priority: Option<TaskPriority>,
    pub deadline_from: Option<DateTime<Utc>>,
    pub deadline_to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(status: TaskStatus) -> Task {
        Task {
            id: TaskId::from("abc12345"),
            title: "Design schema".to_string(),
            description: None,
            status,
            priority: TaskPriority::Medium,
            assignee: None,
            created_by: "user".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            success_criteria: Vec::new(),
            feedback_quality: None,
            feedback_timeliness: None,
            feedback_notes: None,
            completion_summary: None,
            deadline: None,
            estimated_hours: None,
            actual_hours: None,
            file_refs: Vec::new(),
        }
    }

    #[test]
    fn completed_status_is_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Blocked.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn default_priority_is_medium() {
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn locked_except_feedback_only_when_completed() {
        assert!(sample_task(TaskStatus::Completed).is_locked_except_feedback());
        assert!(!sample_task(TaskStatus::InProgress).is_locked_except_feedback());
    }

    #[test]
    fn priority_ord_matches_severity() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }
}
