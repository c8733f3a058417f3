use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::Result,
    models::{
        CompleteOptions, Dependency, FeedbackInput, Notification, NotificationKind, Participant,
        ProgressEntry, SchemaVersion, Task, TaskFilter, TaskId, TaskPatch,
    },
};

/// Repository for task CRUD and state transitions. Implementations must be
/// thread-safe and honour §3's invariants transactionally.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a task row and its initial dependency edges in one
    /// transaction (§4.4 `add`). The caller has already resolved the id,
    /// validated fields, and computed the initial status.
    async fn insert(&self, task: Task, edges: &[Dependency]) -> Result<Task>;

    async fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// §4.4 `update`. Callers are responsible for checking that the patch
    /// is legal for the task's current status (§3 invariant 3); this is a
    /// raw apply-and-persist.
    async fn apply_patch(&self, id: &TaskId, patch: TaskPatch) -> Result<Task>;

    /// Mark the task completed in the same transaction as recomputing any
    /// dependents' statuses. Returns the completed task and the ids of
    /// dependents that transitioned to `pending` as a result (§4.5).
    async fn complete(&self, id: &TaskId, options: &CompleteOptions) -> Result<(Task, Vec<TaskId>)>;

    /// §3 invariant 6: only permitted when no outbound `depends_on` edge
    /// targets `id`; cascades to the task's own edges/participants/notifications.
    async fn delete(&self, id: &TaskId) -> Result<()>;

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>>;

    async fn assign(&self, id: &TaskId, agent_id: &str) -> Result<Task>;

    /// Single-shot write (§3 invariant 5): fails if feedback already present.
    async fn set_feedback(&self, id: &TaskId, feedback: FeedbackInput) -> Result<Task>;

    /// Appends a `ProgressEntry` stamped with the caller's agent id and
    /// current time (§4.4 `progress`).
    async fn record_progress(&self, id: &TaskId, agent_id: &str, message: &str) -> Result<ProgressEntry>;

    async fn list_progress(&self, id: &TaskId) -> Result<Vec<ProgressEntry>>;
}

/// Repository for dependency edges, used by [`crate::dependency`]'s
/// algorithms via the concrete edge lists they return.
#[async_trait]
pub trait DependencyRepository: Send + Sync {
    async fn outbound(&self, id: &TaskId) -> Result<Vec<Dependency>>;

    async fn inbound(&self, id: &TaskId) -> Result<Vec<Dependency>>;

    async fn all_edges(&self) -> Result<Vec<Dependency>>;

    /// Inserts edges after verifying both endpoints exist and the insert
    /// would not create a cycle (§4.4, §4.5 `would_create_cycle`).
    async fn add_edges(&self, edges: &[Dependency]) -> Result<()>;
}

/// Repository for collaboration membership (§3 `Participant`).
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Enrolls `agent_id` on `task_id` if not already a participant;
    /// idempotent (§4 expansion: implicit enrollment on task activity).
    async fn join(&self, task_id: &TaskId, agent_id: &str) -> Result<Participant>;

    async fn list(&self, task_id: &TaskId) -> Result<Vec<Participant>>;
}

/// Repository for the notification delivery queue (§4.6).
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Writes a notification row. `agent_id = None` means broadcast.
    async fn emit(
        &self,
        agent_id: Option<&str>,
        task_id: Option<&TaskId>,
        kind: NotificationKind,
        message: &str,
    ) -> Result<Notification>;

    /// Returns unread notifications for `agent_id` plus broadcasts, and
    /// atomically marks them read in the same transaction (§4.6, §7
    /// property 4: exactly-once consumption).
    async fn watch(&self, agent_id: &str, limit: Option<u32>) -> Result<Vec<Notification>>;
}

/// Repository for the versioned schema (§4.2).
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    async fn current_version(&self) -> Result<i64>;

    async fn record_applied(&self, version: SchemaVersion) -> Result<()>;

    async fn history(&self) -> Result<Vec<SchemaVersion>>;
}

/// Read-only aggregation queries over completed tasks (§4.9).
#[async_trait]
pub trait MetricsRepository: Send + Sync {
    async fn feedback_summary(&self, period: Option<MetricsPeriod>) -> Result<FeedbackSummary>;

    async fn time_summary(&self, period: Option<MetricsPeriod>) -> Result<TimeSummary>;

    async fn adoption_summary(&self, period: Option<MetricsPeriod>) -> Result<AdoptionSummary>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricsPeriod {
    Week,
    Month,
    Range { from: DateTime<Utc>, to: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeedbackSummary {
    pub average_quality: Option<f64>,
    pub average_timeliness: Option<f64>,
    pub quality_distribution: BTreeMap<i32, u64>,
    pub timeliness_distribution: BTreeMap<i32, u64>,
    pub counts_by_assignee: BTreeMap<String, u64>,
    pub monthly_trend: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TimeSummary {
    pub average_estimation_accuracy: Option<f64>,
    pub total_estimated_hours: f64,
    pub total_actual_hours: f64,
    pub average_actual_hours_by_assignee: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AdoptionSummary {
    pub completed_count: u64,
    pub with_criteria: u64,
    pub with_summary: u64,
    pub with_feedback: u64,
}

impl AdoptionSummary {
    pub fn criteria_fraction(&self) -> f64 {
        fraction(self.with_criteria, self.completed_count)
    }

    pub fn summary_fraction(&self) -> f64 {
        fraction(self.with_summary, self.completed_count)
    }

    pub fn feedback_fraction(&self) -> f64 {
        fraction(self.with_feedback, self.completed_count)
    }
}

fn fraction(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adoption_fraction_handles_zero_completed() {
        let summary = AdoptionSummary::default();
        assert_eq!(summary.criteria_fraction(), 0.0);
    }

    #[test]
    fn adoption_fraction_computes_ratio() {
        let summary = AdoptionSummary {
            completed_count: 4,
            with_criteria: 3,
            with_summary: 2,
            with_feedback: 1,
        };
        assert_eq!(summary.criteria_fraction(), 0.75);
        assert_eq!(summary.summary_fraction(), 0.5);
        assert_eq!(summary.feedback_fraction(), 0.25);
    }
}
