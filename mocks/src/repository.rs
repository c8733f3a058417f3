//! In-memory implementation of every `task-core` repository trait.
//!
//! Mirrors a real store's transactional guarantees closely enough for unit
//! tests: dependency edges gate status the same way, feedback is single-shot,
//! notifications are delivered exactly once. Adds error injection and call
//! history tracking on top, for testing caller behavior under failure.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use task_core::dependency::{newly_unblocked, would_create_cycle};
use task_core::error::{Result, TaskError};
use task_core::models::{
    CompleteOptions, Dependency, FeedbackInput, Notification, NotificationKind, Participant,
    ProgressEntry, SchemaVersion, Task, TaskFilter, TaskId, TaskPatch, TaskStatus,
};
use task_core::repository::{
    AdoptionSummary, DependencyRepository, FeedbackSummary, MetricsPeriod, MetricsRepository,
    NotificationRepository, ParticipantRepository, SchemaRepository, TaskRepository, TimeSummary,
};

#[derive(Default)]
struct State {
    tasks: HashMap<TaskId, Task>,
    edges: Vec<Dependency>,
    participants: Vec<Participant>,
    notifications: Vec<Notification>,
    next_notification_id: i64,
    progress: Vec<ProgressEntry>,
}

/// Thread-safe in-memory `TaskRepository` (+ every sibling trait), with
/// error injection and call history for exercising callers under failure.
pub struct MockTaskRepository {
    state: Arc<Mutex<State>>,
    error_injection: Arc<Mutex<Option<TaskError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl Default for MockTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let repo = Self::new();
        let mut state = repo.state.lock();
        for task in tasks {
            state.tasks.insert(task.id.clone(), task);
        }
        drop(state);
        repo
    }

    /// Injects an error to be returned (and consumed) by the next call.
    pub fn inject_error(&self, error: TaskError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called; call history: {:?}",
            *history
        );
    }

    fn check_error_injection(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    fn record(&self, method: &str) {
        self.call_history.lock().push(method.to_string());
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn insert(&self, task: Task, edges: &[Dependency]) -> Result<Task> {
        self.record("insert");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        for edge in edges {
            if !state.tasks.contains_key(&edge.depends_on) {
                return Err(TaskError::dependency_violation(format!(
                    "depends_on target '{}' does not exist",
                    edge.depends_on
                )));
            }
        }
        state.tasks.insert(task.id.clone(), task.clone());
        state.edges.extend(edges.iter().cloned());
        Ok(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        self.record("get");
        self.check_error_injection()?;
        Ok(self.state.lock().tasks.get(id).cloned())
    }

    async fn apply_patch(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        self.record("apply_patch");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let task = state.tasks.get_mut(id).ok_or_else(|| TaskError::not_found(id.to_string()))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(assignee) = patch.assignee {
            task.assignee = Some(assignee);
        }
        if let Some(deadline) = patch.deadline {
            task.deadline = Some(deadline);
        }
        if let Some(estimated_hours) = patch.estimated_hours {
            task.estimated_hours = Some(estimated_hours);
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn complete(&self, id: &TaskId, options: &CompleteOptions) -> Result<(Task, Vec<TaskId>)> {
        self.record("complete");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let task = state.tasks.get(id).ok_or_else(|| TaskError::not_found(id.to_string()))?.clone();
        if task.status == TaskStatus::Completed {
            return Ok((task, Vec::new()));
        }

        let now = Utc::now();
        {
            let task_mut = state.tasks.get_mut(id).unwrap();
            task_mut.status = TaskStatus::Completed;
            task_mut.completed_at = Some(now);
            task_mut.updated_at = now;
            task_mut.actual_hours = options.actual_hours.or(task_mut.actual_hours);
            task_mut.completion_summary = options.summary.clone().or(task_mut.completion_summary.clone());
        }

        let dependents: Vec<Task> = state
            .edges
            .iter()
            .filter(|e| &e.depends_on == id)
            .filter_map(|e| state.tasks.get(&e.task_id).cloned())
            .collect();
        let edges = state.edges.clone();
        let statuses: HashMap<TaskId, TaskStatus> =
            state.tasks.iter().map(|(id, t)| (id.clone(), t.status)).collect();

        let unblocked = newly_unblocked(
            id,
            dependents.iter(),
            |task_id| edges.iter().filter(|e| &e.task_id == task_id).cloned().collect(),
            |dep_id| statuses.get(dep_id).copied(),
        );

        for dependent_id in &unblocked {
            if let Some(t) = state.tasks.get_mut(dependent_id) {
                t.status = TaskStatus::Pending;
                t.updated_at = now;
            }
        }

        let completed = state.tasks.get(id).cloned().unwrap();
        Ok((completed, unblocked))
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        self.record("delete");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        if state.edges.iter().any(|e| &e.depends_on == id) {
            return Err(TaskError::dependency_violation(format!(
                "cannot delete {id}: other tasks depend on it"
            )));
        }
        if state.tasks.remove(id).is_none() {
            return Err(TaskError::not_found(id.to_string()));
        }
        state.edges.retain(|e| &e.task_id != id);
        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.record("list");
        self.check_error_injection()?;

        let state = self.state.lock();
        let mut result: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.status.map(|s| s == t.status).unwrap_or(true))
            .filter(|t| filter.priority.map(|p| p == t.priority).unwrap_or(true))
            .filter(|t| filter.assignee.as_ref().map(|a| t.assignee.as_deref() == Some(a.as_str())).unwrap_or(true))
            .filter(|t| {
                filter
                    .has_deps
                    .map(|has| {
                        let has_any = state.edges.iter().any(|e| e.task_id == t.id);
                        has_any == has
                    })
                    .unwrap_or(true)
            })
            .filter(|t| {
                filter
                    .file_ref_contains
                    .as_ref()
                    .map(|needle| t.file_refs.iter().any(|f| f.path.contains(needle.as_str())))
                    .unwrap_or(true)
            })
            .filter(|t| filter.deadline_from.map(|from| t.deadline.map(|d| d >= from).unwrap_or(false)).unwrap_or(true))
            .filter(|t| filter.deadline_to.map(|to| t.deadline.map(|d| d <= to).unwrap_or(false)).unwrap_or(true))
            .cloned()
            .collect();

        result.sort_by_key(|t| t.created_at);

        if let Some(offset) = filter.offset {
            if offset as usize >= result.len() {
                return Ok(Vec::new());
            }
            result = result.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            result.truncate(limit as usize);
        }
        Ok(result)
    }

    async fn assign(&self, id: &TaskId, agent_id: &str) -> Result<Task> {
        self.apply_patch(id, TaskPatch { assignee: Some(agent_id.to_string()), ..Default::default() }).await
    }

    async fn set_feedback(&self, id: &TaskId, feedback: FeedbackInput) -> Result<Task> {
        self.record("set_feedback");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        let task = state.tasks.get_mut(id).ok_or_else(|| TaskError::not_found(id.to_string()))?;
        if task.status != TaskStatus::Completed {
            return Err(TaskError::illegal_transition("feedback requires a completed task"));
        }
        if task.has_feedback() {
            return Err(TaskError::illegal_transition(format!("feedback already recorded for {id}")));
        }
        task.feedback_quality = feedback.quality;
        task.feedback_timeliness = feedback.timeliness;
        task.feedback_notes = feedback.note;
        Ok(task.clone())
    }

    async fn record_progress(&self, id: &TaskId, agent_id: &str, message: &str) -> Result<ProgressEntry> {
        self.record("record_progress");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        if !state.tasks.contains_key(id) {
            return Err(TaskError::not_found(id.to_string()));
        }
        let entry = ProgressEntry {
            task_id: id.clone(),
            timestamp: Utc::now(),
            agent_id: agent_id.to_string(),
            message: message.to_string(),
        };
        state.progress.push(entry.clone());
        Ok(entry)
    }

    async fn list_progress(&self, id: &TaskId) -> Result<Vec<ProgressEntry>> {
        self.record("list_progress");
        self.check_error_injection()?;
        Ok(self.state.lock().progress.iter().filter(|p| &p.task_id == id).cloned().collect())
    }
}

#[async_trait]
impl DependencyRepository for MockTaskRepository {
    async fn outbound(&self, id: &TaskId) -> Result<Vec<Dependency>> {
        Ok(self.state.lock().edges.iter().filter(|e| &e.task_id == id).cloned().collect())
    }

    async fn inbound(&self, id: &TaskId) -> Result<Vec<Dependency>> {
        Ok(self.state.lock().edges.iter().filter(|e| &e.depends_on == id).cloned().collect())
    }

    async fn all_edges(&self) -> Result<Vec<Dependency>> {
        Ok(self.state.lock().edges.clone())
    }

    async fn add_edges(&self, edges: &[Dependency]) -> Result<()> {
        let mut state = self.state.lock();
        if would_create_cycle(&state.edges, edges) {
            let sample = edges.first().cloned().unwrap_or(Dependency {
                task_id: TaskId::from(""),
                depends_on: TaskId::from(""),
            });
            return Err(TaskError::CycleDetected(sample.task_id.to_string(), sample.depends_on.to_string()));
        }
        for edge in edges {
            if !state.tasks.contains_key(&edge.depends_on) {
                return Err(TaskError::dependency_violation(format!(
                    "depends_on target '{}' does not exist",
                    edge.depends_on
                )));
            }
        }
        state.edges.extend(edges.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl ParticipantRepository for MockTaskRepository {
    async fn join(&self, task_id: &TaskId, agent_id: &str) -> Result<Participant> {
        let mut state = self.state.lock();
        if let Some(existing) =
            state.participants.iter().find(|p| &p.task_id == task_id && p.agent_id == agent_id)
        {
            return Ok(existing.clone());
        }
        let participant = Participant { task_id: task_id.clone(), agent_id: agent_id.to_string(), joined_at: Utc::now() };
        state.participants.push(participant.clone());
        Ok(participant)
    }

    async fn list(&self, task_id: &TaskId) -> Result<Vec<Participant>> {
        Ok(self.state.lock().participants.iter().filter(|p| &p.task_id == task_id).cloned().collect())
    }
}

#[async_trait]
impl NotificationRepository for MockTaskRepository {
    async fn emit(&self, agent_id: Option<&str>, task_id: Option<&TaskId>, kind: NotificationKind, message: &str) -> Result<Notification> {
        let mut state = self.state.lock();
        let id = state.next_notification_id;
        state.next_notification_id += 1;
        let notification = Notification {
            id,
            agent_id: agent_id.map(str::to_string),
            task_id: task_id.cloned(),
            kind,
            message: message.to_string(),
            created_at: Utc::now(),
            read: false,
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn watch(&self, agent_id: &str, limit: Option<u32>) -> Result<Vec<Notification>> {
        let mut state = self.state.lock();
        let mut delivered = Vec::new();
        for notification in state.notifications.iter_mut() {
            if notification.read {
                continue;
            }
            let targeted = notification.agent_id.as_deref().map(|a| a == agent_id).unwrap_or(true);
            if !targeted {
                continue;
            }
            notification.read = true;
            delivered.push(notification.clone());
            if let Some(limit) = limit {
                if delivered.len() as u32 >= limit {
                    break;
                }
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl SchemaRepository for MockTaskRepository {
    async fn current_version(&self) -> Result<i64> {
        Ok(1)
    }

    async fn record_applied(&self, _version: SchemaVersion) -> Result<()> {
        Ok(())
    }

    async fn history(&self) -> Result<Vec<SchemaVersion>> {
        Ok(vec![SchemaVersion {
            version: 1,
            applied_at: Utc::now(),
            description: "initial schema".to_string(),
        }])
    }
}

#[async_trait]
impl MetricsRepository for MockTaskRepository {
    async fn feedback_summary(&self, _period: Option<MetricsPeriod>) -> Result<FeedbackSummary> {
        let state = self.state.lock();
        let mut summary = FeedbackSummary::default();
        let completed_with_feedback: Vec<&Task> =
            state.tasks.values().filter(|t| t.status == TaskStatus::Completed && t.has_feedback()).collect();
        let n = completed_with_feedback.len() as f64;
        if n > 0.0 {
            let quality_sum: i64 = completed_with_feedback.iter().filter_map(|t| t.feedback_quality).map(i64::from).sum();
            summary.average_quality = Some(quality_sum as f64 / n);
        }
        for task in completed_with_feedback {
            if let Some(q) = task.feedback_quality {
                *summary.quality_distribution.entry(q).or_insert(0) += 1;
            }
            if let Some(assignee) = &task.assignee {
                *summary.counts_by_assignee.entry(assignee.clone()).or_insert(0) += 1;
            }
        }
        Ok(summary)
    }

    async fn time_summary(&self, _period: Option<MetricsPeriod>) -> Result<TimeSummary> {
        let state = self.state.lock();
        let mut summary = TimeSummary::default();
        let mut accuracy_sum = 0.0;
        let mut n = 0u32;
        for task in state.tasks.values() {
            if let (Some(estimated), Some(actual)) = (task.estimated_hours, task.actual_hours) {
                summary.total_estimated_hours += estimated;
                summary.total_actual_hours += actual;
                accuracy_sum += task_core::metrics::estimation_accuracy(estimated, actual);
                n += 1;
            }
        }
        if n > 0 {
            summary.average_estimation_accuracy = Some(accuracy_sum / n as f64);
        }
        Ok(summary)
    }

    async fn adoption_summary(&self, _period: Option<MetricsPeriod>) -> Result<AdoptionSummary> {
        let state = self.state.lock();
        let completed: Vec<&Task> = state.tasks.values().filter(|t| t.status == TaskStatus::Completed).collect();
        Ok(AdoptionSummary {
            completed_count: completed.len() as u64,
            with_criteria: completed.iter().filter(|t| !t.success_criteria.is_empty()).count() as u64,
            with_summary: completed.iter().filter(|t| t.completion_summary.is_some()).count() as u64,
            with_feedback: completed.iter().filter(|t| t.has_feedback()).count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::from(id),
            title: "A task".to_string(),
            description: None,
            status,
            priority: task_core::models::TaskPriority::Medium,
            assignee: None,
            created_by: "user".to_string(),
            created_at: now,
            updated_at: now,
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

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let repo = MockTaskRepository::new();
        let t = task("aaaaaaaa", TaskStatus::Pending);
        repo.insert(t.clone(), &[]).await.unwrap();
        assert_eq!(repo.get(&t.id).await.unwrap().unwrap().title, t.title);
        repo.assert_called("insert");
    }

    #[tokio::test]
    async fn error_injection_is_consumed_once() {
        let repo = MockTaskRepository::new();
        repo.inject_error(TaskError::StoreBusy("simulated".to_string()));
        let err = repo.get(&TaskId::from("missing0")).await.unwrap_err();
        assert!(matches!(err, TaskError::StoreBusy(_)));
        assert!(repo.get(&TaskId::from("missing0")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_unblocks_dependent() {
        let repo = MockTaskRepository::new();
        let a = task("bbbbbbbb", TaskStatus::Pending);
        let b = task("cccccccc", TaskStatus::Blocked);
        repo.insert(a.clone(), &[]).await.unwrap();
        repo.insert(b.clone(), &[Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }]).await.unwrap();

        let (_, unblocked) = repo.complete(&a.id, &CompleteOptions::default()).await.unwrap();
        assert_eq!(unblocked, vec![b.id.clone()]);
    }

    #[tokio::test]
    async fn notifications_deliver_once() {
        let repo = MockTaskRepository::new();
        repo.emit(Some("agent-a"), None, NotificationKind::Discovery, "found it").await.unwrap();
        let first = repo.watch("agent-a", None).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(repo.watch("agent-a", None).await.unwrap().is_empty());
    }
}
