//! The facade every command in `main.rs` drives: field validation, status
//! computation, and notification emission sit here rather than in the
//! store, so the store stays a plain persistence layer (§4.4-§4.7).
//!
//! `join`, `share`, `note`, `sync_point`, `context`, and `archive` are
//! implemented but not wired to a CLI subcommand — they back the
//! collaboration and retention behavior without a stable argument surface
//! of their own yet.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use task_core::criteria::evaluate;
use task_core::dependency::{compute_status, critical_path};
use task_core::error::{Result, TaskError};
use task_core::models::{
    CompleteOptions, Dependency, FeedbackInput, NewTask, Notification, NotificationKind,
    Participant, ProgressEntry, Task, TaskFilter, TaskId, TaskPatch, TaskStatus,
};
use task_core::validation::TaskValidator;
use task_core::FeatureConfig;
use task_store::{
    AdoptionSummary, Contribution, ContributionKind, ContextStore, DependencyRepository, Discovery,
    FeedbackSummary, MetricsPeriod, MetricsRepository, NotificationRepository, ParticipantRepository,
    SchemaRepository, SharedContext, SqliteStore, SyncPoint, TaskRepository, TimeSummary,
};

pub struct TaskCore {
    store: Arc<SqliteStore>,
    context: ContextStore,
    features: FeatureConfig,
    archives_dir: PathBuf,
    agent_id: String,
}

impl TaskCore {
    pub fn new(
        store: Arc<SqliteStore>,
        context: ContextStore,
        features: FeatureConfig,
        archives_dir: PathBuf,
        agent_id: String,
    ) -> Self {
        Self { store, context, features, archives_dir, agent_id }
    }

    pub async fn add(&self, new_task: NewTask) -> Result<Task> {
        TaskValidator::validate_title(&new_task.title)?;
        if let Some(description) = &new_task.description {
            TaskValidator::validate_description(description)?;
        }
        TaskValidator::validate_success_criteria(&new_task.success_criteria)?;
        for file_ref in &new_task.file_refs {
            TaskValidator::validate_file_ref(file_ref)?;
        }
        if let Some(hours) = new_task.estimated_hours {
            TaskValidator::validate_hours(hours, "estimated_hours")?;
        }

        let id = self.store.next_task_id().await?;
        let edges: Vec<Dependency> =
            new_task.depends_on.iter().map(|dep| Dependency { task_id: id.clone(), depends_on: dep.clone() }).collect();

        let mut statuses = HashMap::new();
        for dep in &new_task.depends_on {
            let dep_task = self
                .store
                .get(dep)
                .await?
                .ok_or_else(|| TaskError::dependency_violation(format!("unknown dependency {dep}")))?;
            statuses.insert(dep.clone(), dep_task.status);
        }
        let status = compute_status(&edges, |id| statuses.get(id).copied());

        let created_by = new_task.created_by.clone().unwrap_or_else(|| self.agent_id.clone());
        let now = Utc::now();
        let task = Task {
            id: id.clone(),
            title: new_task.title,
            description: new_task.description,
            status,
            priority: new_task.priority.unwrap_or_default(),
            assignee: new_task.assignee.clone(),
            created_by: created_by.clone(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            success_criteria: new_task.success_criteria,
            feedback_quality: None,
            feedback_timeliness: None,
            feedback_notes: None,
            completion_summary: None,
            deadline: new_task.deadline,
            estimated_hours: new_task.estimated_hours,
            actual_hours: None,
            file_refs: new_task.file_refs,
        };

        let inserted = self.store.insert(task, &edges).await?;
        self.store.join(&inserted.id, &created_by).await?;
        if let Some(assignee) = &inserted.assignee {
            self.store.join(&inserted.id, assignee).await?;
        }
        Ok(inserted)
    }

    pub async fn show(&self, id: &TaskId) -> Result<Task> {
        self.store.get(id).await?.ok_or_else(|| TaskError::not_found(id.as_str()))
    }

    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let current = self.show(id).await?;
        let touches_non_feedback = patch.title.is_some()
            || patch.description.is_some()
            || patch.priority.is_some()
            || patch.assignee.is_some()
            || patch.deadline.is_some()
            || patch.estimated_hours.is_some()
            || matches!(patch.status, Some(s) if s != current.status);
        if current.is_locked_except_feedback() && touches_non_feedback {
            return Err(TaskError::illegal_transition(format!(
                "task {id} is completed; only feedback may change"
            )));
        }
        if let Some(title) = &patch.title {
            TaskValidator::validate_title(title)?;
        }
        if let Some(description) = &patch.description {
            TaskValidator::validate_description(description)?;
        }
        if let Some(hours) = patch.estimated_hours {
            TaskValidator::validate_hours(hours, "estimated_hours")?;
        }
        self.store.apply_patch(id, patch).await
    }

    pub async fn complete(&self, id: &TaskId, options: CompleteOptions) -> Result<Task> {
        let current = self.show(id).await?;
        if current.status == TaskStatus::Completed {
            return Ok(current);
        }

        if options.validate && self.features.effective().success_criteria {
            let outcome = evaluate(&current.success_criteria, &options.criteria_context)?;
            if !outcome.overall_pass {
                return Err(TaskError::ValidationFailed {
                    failures: outcome.failures.into_iter().map(|f| f.criterion).collect(),
                });
            }
        }
        if let Some(hours) = options.actual_hours {
            TaskValidator::validate_hours(hours, "actual_hours")?;
        }
        if let Some(summary) = &options.summary {
            TaskValidator::validate_completion_summary(summary)?;
        }

        let (completed, unblocked) = self.store.complete(id, &options).await?;

        for dependent_id in &unblocked {
            if let Some(dependent) = self.store.get(dependent_id).await? {
                let message = format!("task {} is now unblocked", dependent.id);
                self.store.emit(dependent.assignee.as_deref(), Some(&dependent.id), NotificationKind::Unblocked, &message).await?;
            }
        }

        if options.impact_review {
            let siblings = TaskRepository::list(&*self.store, TaskFilter::default()).await?;
            for other in siblings.iter().filter(|t| t.id != completed.id && !t.status.is_terminal()) {
                let shares_file =
                    other.file_refs.iter().any(|fr| completed.file_refs.iter().any(|cf| cf.path == fr.path));
                if shares_file {
                    let message = format!("task {} completed and may affect a file this task references", completed.id);
                    self.store.emit(other.assignee.as_deref(), Some(&other.id), NotificationKind::Impact, &message).await?;
                }
            }
        }

        let message = format!("task {} completed", completed.id);
        self.store.emit(None, Some(&completed.id), NotificationKind::Completed, &message).await?;

        Ok(completed)
    }

    pub async fn delete(&self, id: &TaskId) -> Result<()> {
        self.store.delete(id).await
    }

    pub async fn assign(&self, id: &TaskId, agent_id: &str) -> Result<Task> {
        let current = self.show(id).await?;
        if current.is_locked_except_feedback() {
            return Err(TaskError::illegal_transition(format!(
                "task {id} is completed; only feedback may change"
            )));
        }
        let task = self.store.assign(id, agent_id).await?;
        self.store.join(id, agent_id).await?;
        Ok(task)
    }

    pub async fn progress(&self, id: &TaskId, agent_id: &str, message: &str) -> Result<ProgressEntry> {
        self.store.join(id, agent_id).await?;
        self.store.record_progress(id, agent_id, message).await
    }

    pub async fn feedback(&self, id: &TaskId, input: FeedbackInput) -> Result<Task> {
        TaskValidator::validate_feedback(&input)?;
        if let Some(note) = &input.note {
            TaskValidator::validate_feedback_notes(note)?;
        }
        self.store.set_feedback(id, input).await
    }

    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut tasks = TaskRepository::list(&*self.store, filter).await?;
        tasks.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
        Ok(tasks)
    }

    pub async fn critical_path(&self) -> Result<Vec<TaskId>> {
        let tasks = TaskRepository::list(&*self.store, TaskFilter::default()).await?;
        let edges = self.store.all_edges().await?;
        Ok(critical_path(&tasks, &edges))
    }

    /// Outbound dependency edges for `id`, i.e. the tasks it depends on.
    /// Exposed so policy layers (the `Orchestrator` facade's project-level
    /// completion rule) can inspect the graph without reaching into the
    /// store directly.
    pub async fn dependencies(&self, id: &TaskId) -> Result<Vec<Dependency>> {
        self.store.outbound(id).await
    }

    pub async fn watch(&self, agent_id: &str, limit: Option<u32>) -> Result<Vec<Notification>> {
        self.store.watch(agent_id, limit).await
    }

    pub async fn discover(&self, id: &TaskId, agent_id: &str, message: &str, tags: Vec<String>) -> Result<Notification> {
        self.store.join(id, agent_id).await?;
        self.context.append_discovery(
            id,
            Discovery { agent_id: agent_id.to_string(), timestamp: Utc::now(), impact: None, tags, content: message.to_string() },
        )?;
        self.store.emit(None, Some(id), NotificationKind::Discovery, message).await
    }

    pub async fn feedback_summary(&self, period: Option<MetricsPeriod>) -> Result<FeedbackSummary> {
        self.store.feedback_summary(period).await
    }

    pub async fn time_summary(&self, period: Option<MetricsPeriod>) -> Result<TimeSummary> {
        self.store.time_summary(period).await
    }

    pub async fn adoption_summary(&self, period: Option<MetricsPeriod>) -> Result<AdoptionSummary> {
        self.store.adoption_summary(period).await
    }

    pub async fn schema_status(&self) -> Result<(i64, Vec<task_core::models::SchemaVersion>)> {
        Ok((self.store.current_version().await?, self.store.history().await?))
    }

    /// Enrolls `agent_id` on `task_id` (collaboration surface, §5 expansion).
    pub async fn join(&self, id: &TaskId, agent_id: &str) -> Result<Participant> {
        self.store.join(id, agent_id).await
    }

    /// Appends a shared-context contribution and notifies every other
    /// participant (`context_updated`).
    pub async fn share(&self, id: &TaskId, agent_id: &str, content: &str) -> Result<()> {
        self.context.append_contribution(
            id,
            Contribution { agent_id: agent_id.to_string(), timestamp: Utc::now(), kind: ContributionKind::Update, content: content.to_string() },
        )?;
        let participants = <SqliteStore as ParticipantRepository>::list(&self.store, id).await?;
        for participant in participants.iter().filter(|p| p.agent_id != agent_id) {
            self.store
                .emit(Some(&participant.agent_id), Some(id), NotificationKind::ContextUpdated, "shared context updated")
                .await?;
        }
        Ok(())
    }

    /// Appends to the caller's private note file; never notifies anyone.
    pub async fn note(&self, id: &TaskId, agent_id: &str, text: &str) -> Result<()> {
        self.context.append_private_note(id, agent_id, text)
    }

    pub async fn sync_point(&self, id: &TaskId, agent_id: &str, content: &str) -> Result<()> {
        self.context.append_sync_point(id, SyncPoint { agent_id: agent_id.to_string(), timestamp: Utc::now(), content: content.to_string() })?;
        self.store.emit(None, Some(id), NotificationKind::Sync, content).await?;
        Ok(())
    }

    pub fn context(&self, id: &TaskId) -> Result<SharedContext> {
        self.context.read_shared(id)
    }

    /// Bundles the task row, its dependency edges, and its shared context
    /// into a manifest file, then deletes the row under the same
    /// no-incoming-edge rule as `delete` (§5 expansion).
    pub async fn archive(&self, id: &TaskId) -> Result<PathBuf> {
        let task = self.show(id).await?;
        if !task.status.is_terminal() {
            return Err(TaskError::illegal_transition(format!(
                "task {id} must be completed or cancelled before archiving"
            )));
        }
        let edges = self.store.outbound(id).await?;
        let context = self.context.read_shared(id)?;

        let manifest = serde_json::json!({
            "task": task,
            "dependencies": edges,
            "context": context,
        });
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| TaskError::Internal(format!("archive manifest encode failed: {e}")))?;

        std::fs::create_dir_all(&self.archives_dir)
            .map_err(|e| TaskError::Internal(format!("cannot create archives dir: {e}")))?;
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
        let path = self.archives_dir.join(format!("task_{}_{ts}.tar.gz", id.as_str()));
        let mut file = std::fs::File::create(&path)
            .map_err(|e| TaskError::Internal(format!("cannot create archive file: {e}")))?;
        use std::io::Write;
        file.write_all(&bytes).map_err(|e| TaskError::Internal(format!("archive write failed: {e}")))?;
        file.sync_all().map_err(|e| TaskError::Internal(format!("archive fsync failed: {e}")))?;

        self.store.delete(id).await?;
        Ok(path)
    }
}

pub fn parse_metrics_period(value: &str) -> Option<MetricsPeriod> {
    match value {
        "week" => Some(MetricsPeriod::Week),
        "month" => Some(MetricsPeriod::Month),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_core::models::{NewTask, TaskPriority};

    async fn engine(dir: &std::path::Path) -> TaskCore {
        let db_path = dir.join("tasks.db");
        let store = SqliteStore::connect(&db_path.display().to_string()).await.unwrap();
        store.migrate(dir.join("backups")).await.unwrap();
        let context = ContextStore::new(dir);
        TaskCore::new(Arc::new(store), context, FeatureConfig::default(), dir.join("archives"), "tester".to_string())
    }

    #[tokio::test]
    async fn add_computes_pending_status_with_no_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let task = core.add(NewTask { title: "Design schema".to_string(), ..Default::default() }).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_by, "tester");
    }

    #[tokio::test]
    async fn add_with_unmet_dependency_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let a = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        let b = core
            .add(NewTask { title: "B".to_string(), depends_on: vec![a.id.clone()], ..Default::default() })
            .await
            .unwrap();
        assert_eq!(b.status, TaskStatus::Blocked);
    }

    #[tokio::test]
    async fn completing_dependency_unblocks_dependent() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let a = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        let b = core
            .add(NewTask { title: "B".to_string(), depends_on: vec![a.id.clone()], ..Default::default() })
            .await
            .unwrap();
        core.complete(&a.id, CompleteOptions::default()).await.unwrap();
        let reloaded = core.show(&b.id).await.unwrap();
        assert_eq!(reloaded.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn complete_twice_is_idempotent_noop() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let a = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        let first = core.complete(&a.id, CompleteOptions::default()).await.unwrap();
        let second = core.complete(&a.id, CompleteOptions::default()).await.unwrap();
        assert_eq!(first.completed_at, second.completed_at);
    }

    #[tokio::test]
    async fn updating_completed_task_title_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let a = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        core.complete(&a.id, CompleteOptions::default()).await.unwrap();
        let err = core.update(&a.id, TaskPatch { title: Some("renamed".to_string()), ..Default::default() }).await.unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn updating_completed_task_assignee_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let a = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        core.complete(&a.id, CompleteOptions::default()).await.unwrap();
        let err = core
            .update(&a.id, TaskPatch { assignee: Some("agent-bob".to_string()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn assigning_a_completed_task_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let a = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        core.complete(&a.id, CompleteOptions::default()).await.unwrap();
        let err = core.assign(&a.id, "agent-bob").await.unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn validate_on_complete_rejects_unmet_criteria() {
        let dir = tempfile::tempdir().unwrap();
        let mut features = FeatureConfig::default();
        features.enable("success_criteria");
        let db_path = dir.path().join("tasks.db");
        let store = SqliteStore::connect(&db_path.display().to_string()).await.unwrap();
        store.migrate(dir.path().join("backups")).await.unwrap();
        let core = TaskCore::new(
            Arc::new(store),
            ContextStore::new(dir.path()),
            features,
            dir.path().join("archives"),
            "tester".to_string(),
        );

        let task = core
            .add(NewTask {
                title: "Ship it".to_string(),
                success_criteria: vec![task_core::models::SuccessCriterion {
                    criterion: "coverage".to_string(),
                    measurable: "coverage >= 80".to_string(),
                }],
                priority: Some(TaskPriority::High),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut context = std::collections::BTreeMap::new();
        context.insert("coverage".to_string(), task_core::models::CriteriaValue::Number(50.0));
        let err = core
            .complete(&task.id, CompleteOptions { validate: true, criteria_context: context, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn archive_requires_terminal_status() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let task = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        let err = core.archive(&task.id).await.unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn archive_writes_manifest_and_removes_task() {
        let dir = tempfile::tempdir().unwrap();
        let core = engine(dir.path()).await;
        let task = core.add(NewTask { title: "A".to_string(), ..Default::default() }).await.unwrap();
        core.complete(&task.id, CompleteOptions::default()).await.unwrap();
        let path = core.archive(&task.id).await.unwrap();
        assert!(path.exists());
        assert!(core.show(&task.id).await.is_err());
    }
}
