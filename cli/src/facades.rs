//! Role-scoped policy layers over [`TaskCore`] (§4.11): `Orchestrator` and
//! `Worker` expose disjoint operation sets so a caller can't accidentally
//! reach for the wrong role's capability. Neither facade holds any state or
//! authority of its own — every call bottoms out in the same `TaskCore`
//! method a direct caller would use; the separation is policy, not a
//! permission boundary enforced by the store.

use task_core::error::{Result, TaskError};
use task_core::models::{
    CompleteOptions, NewTask, Notification, ProgressEntry, Task, TaskFilter, TaskId, TaskPatch, TaskStatus,
};
use task_store::{AdoptionSummary, FeedbackSummary, MetricsPeriod, TimeSummary};

use crate::engine::TaskCore;

/// Project creation, breakdown, assignment, and monitoring. Completes tasks
/// only at the aggregate level — a task that itself has dependencies,
/// standing in for "the work it rolls up is done" rather than a single
/// worker's assignment.
pub struct Orchestrator<'a> {
    core: &'a TaskCore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(core: &'a TaskCore) -> Self {
        Self { core }
    }

    pub async fn create(&self, new_task: NewTask) -> Result<Task> {
        self.core.add(new_task).await
    }

    pub async fn assign(&self, id: &TaskId, agent_id: &str) -> Result<Task> {
        self.core.assign(id, agent_id).await
    }

    pub async fn monitor(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.core.list(filter).await
    }

    pub async fn critical_path(&self) -> Result<Vec<TaskId>> {
        self.core.critical_path().await
    }

    pub async fn feedback_summary(&self, period: Option<MetricsPeriod>) -> Result<FeedbackSummary> {
        self.core.feedback_summary(period).await
    }

    pub async fn time_summary(&self, period: Option<MetricsPeriod>) -> Result<TimeSummary> {
        self.core.time_summary(period).await
    }

    pub async fn adoption_summary(&self, period: Option<MetricsPeriod>) -> Result<AdoptionSummary> {
        self.core.adoption_summary(period).await
    }

    /// Completes `id` as a project aggregate: rejected if `id` has no
    /// outbound dependencies, since a leafless task is a worker's own
    /// assignment, not a rollup of subtasks.
    pub async fn complete_project(&self, id: &TaskId, options: CompleteOptions) -> Result<Task> {
        let deps = self.core.dependencies(id).await?;
        if deps.is_empty() {
            return Err(TaskError::illegal_transition(format!(
                "task {id} has no dependencies; not a project aggregate"
            )));
        }
        self.core.complete(id, options).await
    }
}

/// Claim/read assignments, report progress, and complete own work.
/// Every operation is scoped to the agent the facade was built for.
pub struct Worker<'a> {
    core: &'a TaskCore,
    agent_id: String,
}

impl<'a> Worker<'a> {
    pub fn new(core: &'a TaskCore, agent_id: String) -> Self {
        Self { core, agent_id }
    }

    /// Self-assigns `id`; rejected if already claimed by someone else.
    pub async fn claim(&self, id: &TaskId) -> Result<Task> {
        let current = self.core.show(id).await?;
        if let Some(existing) = &current.assignee {
            if existing != &self.agent_id {
                return Err(TaskError::illegal_transition(format!("task {id} is already claimed by {existing}")));
            }
        }
        self.core.assign(id, &self.agent_id).await
    }

    pub async fn assignments(&self) -> Result<Vec<Task>> {
        self.core.list(TaskFilter { assignee: Some(self.agent_id.clone()), ..Default::default() }).await
    }

    pub async fn progress(&self, id: &TaskId, message: &str) -> Result<ProgressEntry> {
        self.core.progress(id, &self.agent_id, message).await
    }

    pub async fn note(&self, id: &TaskId, text: &str) -> Result<()> {
        self.core.note(id, &self.agent_id, text).await
    }

    pub async fn discover(&self, id: &TaskId, message: &str, tags: Vec<String>) -> Result<Notification> {
        self.core.discover(id, &self.agent_id, message, tags).await
    }

    /// Sets `status = blocked` with a reason, recorded as a progress entry
    /// since the data model has no dedicated block-reason field.
    pub async fn escalate(&self, id: &TaskId, reason: &str) -> Result<Task> {
        let current = self.core.show(id).await?;
        if current.assignee.as_deref() != Some(self.agent_id.as_str()) {
            return Err(TaskError::illegal_transition(format!("task {id} is not assigned to {}", self.agent_id)));
        }
        self.core.progress(id, &self.agent_id, &format!("escalated: {reason}")).await?;
        self.core.update(id, TaskPatch { status: Some(TaskStatus::Blocked), ..Default::default() }).await
    }

    /// Creates child tasks depending on `parent_id`, per §4.11's
    /// self-decompose contract.
    pub async fn self_decompose(&self, parent_id: &TaskId, subtask_titles: Vec<String>) -> Result<Vec<Task>> {
        let mut created = Vec::with_capacity(subtask_titles.len());
        for title in subtask_titles {
            let task = self
                .core
                .add(NewTask {
                    title,
                    depends_on: vec![parent_id.clone()],
                    created_by: Some(self.agent_id.clone()),
                    ..Default::default()
                })
                .await?;
            created.push(task);
        }
        Ok(created)
    }

    /// Completes `id`; rejected if `id` isn't assigned to this agent.
    pub async fn complete(&self, id: &TaskId, options: CompleteOptions) -> Result<Task> {
        let current = self.core.show(id).await?;
        if current.assignee.as_deref() != Some(self.agent_id.as_str()) {
            return Err(TaskError::illegal_transition(format!("task {id} is not assigned to {}", self.agent_id)));
        }
        self.core.complete(id, options).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use task_core::models::TaskStatus;
    use task_store::{ContextStore, SqliteStore};

    use super::*;

    async fn core(dir: &std::path::Path) -> TaskCore {
        let db_path = dir.join("tasks.db");
        let store = SqliteStore::connect(&db_path.display().to_string()).await.unwrap();
        store.migrate(dir.join("backups")).await.unwrap();
        let context = ContextStore::new(dir);
        TaskCore::new(Arc::new(store), context, task_core::FeatureConfig::default(), dir.join("archives"), "orchestrator".to_string())
    }

    #[tokio::test]
    async fn worker_cannot_claim_a_task_assigned_to_someone_else() {
        let dir = tempfile::tempdir().unwrap();
        let core = core(dir.path()).await;
        let task = core
            .add(NewTask { title: "Ship release".to_string(), assignee: Some("agent-bob".to_string()), ..Default::default() })
            .await
            .unwrap();
        let worker = Worker::new(&core, "agent-alice".to_string());
        let err = worker.claim(&task.id).await.unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn worker_cannot_complete_a_task_not_assigned_to_them() {
        let dir = tempfile::tempdir().unwrap();
        let core = core(dir.path()).await;
        let task = core.add(NewTask { title: "Ship release".to_string(), ..Default::default() }).await.unwrap();
        let worker = Worker::new(&core, "agent-alice".to_string());
        let err = worker.complete(&task.id, CompleteOptions::default()).await.unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn worker_escalate_blocks_task_and_records_progress() {
        let dir = tempfile::tempdir().unwrap();
        let core = core(dir.path()).await;
        let task = core
            .add(NewTask { title: "Migrate database".to_string(), assignee: Some("agent-alice".to_string()), ..Default::default() })
            .await
            .unwrap();
        let worker = Worker::new(&core, "agent-alice".to_string());
        let escalated = worker.escalate(&task.id, "need prod credentials").await.unwrap();
        assert_eq!(escalated.status, TaskStatus::Blocked);
    }

    #[tokio::test]
    async fn worker_self_decompose_creates_children_depending_on_parent() {
        let dir = tempfile::tempdir().unwrap();
        let core = core(dir.path()).await;
        let parent = core
            .add(NewTask { title: "Build feature".to_string(), assignee: Some("agent-alice".to_string()), ..Default::default() })
            .await
            .unwrap();
        let worker = Worker::new(&core, "agent-alice".to_string());
        let children = worker.self_decompose(&parent.id, vec!["Write tests".to_string(), "Update docs".to_string()]).await.unwrap();
        assert_eq!(children.len(), 2);
        for child in &children {
            let deps = core.dependencies(&child.id).await.unwrap();
            assert_eq!(deps.len(), 1);
            assert_eq!(deps[0].depends_on, parent.id);
        }
    }

    #[tokio::test]
    async fn orchestrator_cannot_complete_a_leaf_task_as_a_project() {
        let dir = tempfile::tempdir().unwrap();
        let core = core(dir.path()).await;
        let task = core.add(NewTask { title: "Leaf task".to_string(), ..Default::default() }).await.unwrap();
        let orchestrator = Orchestrator::new(&core);
        let err = orchestrator.complete_project(&task.id, CompleteOptions::default()).await.unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn orchestrator_completes_an_aggregate_task_with_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let core = core(dir.path()).await;
        let sub = core.add(NewTask { title: "Subtask".to_string(), ..Default::default() }).await.unwrap();
        core.complete(&sub.id, CompleteOptions::default()).await.unwrap();
        let aggregate =
            core.add(NewTask { title: "Project rollup".to_string(), depends_on: vec![sub.id.clone()], ..Default::default() }).await.unwrap();
        let orchestrator = Orchestrator::new(&core);
        let completed = orchestrator.complete_project(&aggregate.id, CompleteOptions::default()).await.unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
    }
}
