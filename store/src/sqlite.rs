use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool};
use task_core::{
    error::{Result, TaskError},
    models::{
        CompleteOptions, Dependency, FeedbackInput, Notification, NotificationKind, Participant,
        ProgressEntry, SchemaVersion, Task, TaskFilter, TaskId, TaskPatch,
    },
    repository::{
        AdoptionSummary, DependencyRepository, FeedbackSummary, MetricsPeriod, MetricsRepository,
        NotificationRepository, ParticipantRepository, SchemaRepository, TaskRepository, TimeSummary,
    },
};

use crate::common::{
    build_filter_query, priority_to_string, row_to_task, sqlx_error_to_task_error, status_to_string,
};
use crate::migrator::Migrator;

/// SQLite-backed implementation of every repository trait in `task-core`.
///
/// Connection setup follows §4.1: WAL journaling, `busy_timeout` of at
/// least 5 seconds, foreign keys enabled.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db_path = if database_url == ":memory:" {
            None
        } else {
            Some(PathBuf::from(database_url))
        };

        let connect_options = if database_url == ":memory:" {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(":memory:")
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(database_url)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        // Each pooled connection to ":memory:" gets its own independent
        // database, so an in-memory store must never grow past one
        // connection or pooled callers would silently talk to empty DBs.
        let pool = if database_url == ":memory:" {
            SqlitePoolOptions::new().max_connections(1).connect_with(connect_options).await.map_err(sqlx_error_to_task_error)?
        } else {
            SqlitePool::connect_with(connect_options).await.map_err(sqlx_error_to_task_error)?
        };
        Ok(Self { pool, db_path })
    }

    /// Applies pending migrations (§4.2). Must be called once after `connect`.
    pub async fn migrate(&self, backups_dir: PathBuf) -> Result<()> {
        let migrator = Migrator::new(&self.pool, self.db_path.clone(), backups_dir);
        migrator.apply_pending().await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Generates an 8-lowercase-hex-character id, re-rolling on collision
    /// against the store (§4 expansion).
    async fn generate_task_id(&self) -> Result<TaskId> {
        for _ in 0..32 {
            let candidate: u32 = rand::thread_rng().gen();
            let id = TaskId::from(format!("{candidate:08x}"));
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tasks WHERE id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(sqlx_error_to_task_error)?;
            if exists.is_none() {
                return Ok(id);
            }
        }
        Err(TaskError::Internal("exhausted id generation attempts".to_string()))
    }

    pub async fn next_task_id(&self) -> Result<TaskId> {
        self.generate_task_id().await
    }

    /// Restores the most recent pre-migration backup (§4.2). Requires a
    /// file-backed database; the `schema_version` row is rewound as a side
    /// effect of restoring the whole file, not a separate statement.
    pub async fn rollback(&self, backups_dir: PathBuf) -> Result<()> {
        let migrator = Migrator::new(&self.pool, self.db_path.clone(), backups_dir);
        migrator.rollback().await
    }
}

#[async_trait]
impl TaskRepository for SqliteStore {
    async fn insert(&self, task: Task, edges: &[Dependency]) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_task_error)?;

        for edge in edges {
            let target_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tasks WHERE id = ?")
                .bind(edge.depends_on.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(sqlx_error_to_task_error)?;
            if target_exists.is_none() {
                return Err(TaskError::dependency_violation(format!(
                    "depends_on target '{}' does not exist",
                    edge.depends_on
                )));
            }
        }

        let success_criteria = serde_json::to_string(&task.success_criteria)
            .map_err(|e| TaskError::Internal(format!("success_criteria encode failed: {e}")))?;
        let file_refs = serde_json::to_string(&task.file_refs)
            .map_err(|e| TaskError::Internal(format!("file_refs encode failed: {e}")))?;

        sqlx::query(
            "INSERT INTO tasks (id, title, description, status, priority, assignee, created_by, \
             created_at, updated_at, completed_at, success_criteria, feedback_quality, \
             feedback_timeliness, feedback_notes, completion_summary, deadline, estimated_hours, \
             actual_hours, file_refs) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.as_str())
        .bind(&task.title)
        .bind(&task.description)
        .bind(status_to_string(task.status))
        .bind(priority_to_string(task.priority))
        .bind(&task.assignee)
        .bind(&task.created_by)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .bind(&success_criteria)
        .bind(task.feedback_quality)
        .bind(task.feedback_timeliness)
        .bind(&task.feedback_notes)
        .bind(&task.completion_summary)
        .bind(task.deadline)
        .bind(task.estimated_hours)
        .bind(task.actual_hours)
        .bind(&file_refs)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error_to_task_error)?;

        for edge in edges {
            sqlx::query("INSERT INTO dependencies (task_id, depends_on) VALUES (?, ?)")
                .bind(edge.task_id.as_str())
                .bind(edge.depends_on.as_str())
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_task_error)?;
        }

        tx.commit().await.map_err(sqlx_error_to_task_error)?;
        Ok(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        let row = sqlx::query(
            "SELECT id, title, description, status, priority, assignee, created_by, created_at, \
             updated_at, completed_at, success_criteria, feedback_quality, feedback_timeliness, \
             feedback_notes, completion_summary, deadline, estimated_hours, actual_hours, file_refs \
             FROM tasks WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_task_error)?;

        row.map(|r| row_to_task(&r)).transpose()
    }

    async fn apply_patch(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_task_error)?;
        let existing = fetch_for_update(&mut tx, id).await?;

        let title = patch.title.unwrap_or(existing.title);
        let description = patch.description.or(existing.description);
        let status = patch.status.unwrap_or(existing.status);
        let priority = patch.priority.unwrap_or(existing.priority);
        let assignee = patch.assignee.or(existing.assignee);
        let deadline = patch.deadline.or(existing.deadline);
        let estimated_hours = patch.estimated_hours.or(existing.estimated_hours);
        let now = Utc::now();

        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, assignee = ?, \
             deadline = ?, estimated_hours = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&description)
        .bind(status_to_string(status))
        .bind(priority_to_string(priority))
        .bind(&assignee)
        .bind(deadline)
        .bind(estimated_hours)
        .bind(now)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error_to_task_error)?;

        tx.commit().await.map_err(sqlx_error_to_task_error)?;
        self.get(id).await?.ok_or_else(|| TaskError::not_found(id.to_string()))
    }

    async fn complete(&self, id: &TaskId, options: &CompleteOptions) -> Result<(Task, Vec<TaskId>)> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_task_error)?;
        let existing = fetch_for_update(&mut tx, id).await?;

        if existing.status == task_core::models::TaskStatus::Completed {
            tx.commit().await.map_err(sqlx_error_to_task_error)?;
            return Ok((existing, Vec::new()));
        }

        let now = Utc::now();
        let summary = options.summary.clone().or(existing.completion_summary);

        sqlx::query(
            "UPDATE tasks SET status = 'completed', completed_at = ?, updated_at = ?, \
             actual_hours = ?, completion_summary = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(options.actual_hours.or(existing.actual_hours))
        .bind(&summary)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error_to_task_error)?;

        let dependents = fetch_dependents(&mut tx, id).await?;
        let mut unblocked = Vec::new();
        for dependent in dependents {
            let edges = fetch_outbound_tx(&mut tx, &dependent.id).await?;
            let all_terminal = all_edges_terminal(&mut tx, &edges).await?;
            if dependent.status == task_core::models::TaskStatus::Blocked && all_terminal {
                sqlx::query("UPDATE tasks SET status = 'pending', updated_at = ? WHERE id = ?")
                    .bind(now)
                    .bind(dependent.id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(sqlx_error_to_task_error)?;
                unblocked.push(dependent.id.clone());
            }
        }

        tx.commit().await.map_err(sqlx_error_to_task_error)?;
        let completed = self.get(id).await?.ok_or_else(|| TaskError::not_found(id.to_string()))?;
        Ok((completed, unblocked))
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_task_error)?;

        let incoming: Option<i64> = sqlx::query_scalar("SELECT 1 FROM dependencies WHERE depends_on = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(sqlx_error_to_task_error)?;
        if incoming.is_some() {
            return Err(TaskError::dependency_violation(format!(
                "cannot delete {id}: other tasks depend on it"
            )));
        }

        let affected = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_task_error)?;
        if affected.rows_affected() == 0 {
            return Err(TaskError::not_found(id.to_string()));
        }

        tx.commit().await.map_err(sqlx_error_to_task_error)?;
        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut qb = build_filter_query(&filter);
        let rows = qb.build().fetch_all(&self.pool).await.map_err(sqlx_error_to_task_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn assign(&self, id: &TaskId, agent_id: &str) -> Result<Task> {
        self.apply_patch(id, TaskPatch { assignee: Some(agent_id.to_string()), ..Default::default() }).await
    }

    async fn set_feedback(&self, id: &TaskId, feedback: FeedbackInput) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_task_error)?;
        let existing = fetch_for_update(&mut tx, id).await?;

        if existing.status != task_core::models::TaskStatus::Completed {
            return Err(TaskError::illegal_transition("feedback requires a completed task"));
        }
        if existing.has_feedback() {
            return Err(TaskError::illegal_transition(format!("feedback already recorded for {id}")));
        }

        sqlx::query(
            "UPDATE tasks SET feedback_quality = ?, feedback_timeliness = ?, feedback_notes = ? WHERE id = ?",
        )
        .bind(feedback.quality)
        .bind(feedback.timeliness)
        .bind(&feedback.note)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error_to_task_error)?;

        tx.commit().await.map_err(sqlx_error_to_task_error)?;
        self.get(id).await?.ok_or_else(|| TaskError::not_found(id.to_string()))
    }

    async fn record_progress(&self, id: &TaskId, agent_id: &str, message: &str) -> Result<ProgressEntry> {
        let now = Utc::now();
        let seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM progress WHERE task_id = ? AND ts = ?",
        )
        .bind(id.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_task_error)?;

        sqlx::query("INSERT INTO progress (task_id, ts, seq, agent_id, message) VALUES (?, ?, ?, ?, ?)")
            .bind(id.as_str())
            .bind(now)
            .bind(seq)
            .bind(agent_id)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;

        Ok(ProgressEntry { task_id: id.clone(), timestamp: now, agent_id: agent_id.to_string(), message: message.to_string() })
    }

    async fn list_progress(&self, id: &TaskId) -> Result<Vec<ProgressEntry>> {
        let rows = sqlx::query("SELECT ts, agent_id, message FROM progress WHERE task_id = ? ORDER BY ts ASC, seq ASC")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;
        Ok(rows
            .into_iter()
            .map(|r| ProgressEntry {
                task_id: id.clone(),
                timestamp: r.get("ts"),
                agent_id: r.get("agent_id"),
                message: r.get("message"),
            })
            .collect())
    }
}

async fn fetch_for_update(tx: &mut sqlx::Transaction<'_, Sqlite>, id: &TaskId) -> Result<Task> {
    let row = sqlx::query(
        "SELECT id, title, description, status, priority, assignee, created_by, created_at, \
         updated_at, completed_at, success_criteria, feedback_quality, feedback_timeliness, \
         feedback_notes, completion_summary, deadline, estimated_hours, actual_hours, file_refs \
         FROM tasks WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(sqlx_error_to_task_error)?;
    match row {
        Some(r) => row_to_task(&r),
        None => Err(TaskError::not_found(id.to_string())),
    }
}

async fn fetch_dependents(tx: &mut sqlx::Transaction<'_, Sqlite>, id: &TaskId) -> Result<Vec<Task>> {
    let rows = sqlx::query(
        "SELECT t.id, t.title, t.description, t.status, t.priority, t.assignee, t.created_by, \
         t.created_at, t.updated_at, t.completed_at, t.success_criteria, t.feedback_quality, \
         t.feedback_timeliness, t.feedback_notes, t.completion_summary, t.deadline, \
         t.estimated_hours, t.actual_hours, t.file_refs \
         FROM tasks t JOIN dependencies d ON d.task_id = t.id WHERE d.depends_on = ?",
    )
    .bind(id.as_str())
    .fetch_all(&mut **tx)
    .await
    .map_err(sqlx_error_to_task_error)?;
    rows.iter().map(row_to_task).collect()
}

async fn fetch_outbound_tx(tx: &mut sqlx::Transaction<'_, Sqlite>, id: &TaskId) -> Result<Vec<Dependency>> {
    let rows = sqlx::query("SELECT task_id, depends_on FROM dependencies WHERE task_id = ?")
        .bind(id.as_str())
        .fetch_all(&mut **tx)
        .await
        .map_err(sqlx_error_to_task_error)?;
    Ok(rows
        .into_iter()
        .map(|r| Dependency { task_id: TaskId::from(r.get::<String, _>("task_id")), depends_on: TaskId::from(r.get::<String, _>("depends_on")) })
        .collect())
}

async fn all_edges_terminal(tx: &mut sqlx::Transaction<'_, Sqlite>, edges: &[Dependency]) -> Result<bool> {
    for edge in edges {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM tasks WHERE id = ?")
            .bind(edge.depends_on.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(sqlx_error_to_task_error)?;
        let is_terminal = matches!(status.as_deref(), Some("completed") | Some("cancelled"));
        if !is_terminal {
            return Ok(false);
        }
    }
    Ok(true)
}

#[async_trait]
impl DependencyRepository for SqliteStore {
    async fn outbound(&self, id: &TaskId) -> Result<Vec<Dependency>> {
        let rows = sqlx::query("SELECT task_id, depends_on FROM dependencies WHERE task_id = ?")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;
        Ok(rows
            .into_iter()
            .map(|r| Dependency { task_id: TaskId::from(r.get::<String, _>("task_id")), depends_on: TaskId::from(r.get::<String, _>("depends_on")) })
            .collect())
    }

    async fn inbound(&self, id: &TaskId) -> Result<Vec<Dependency>> {
        let rows = sqlx::query("SELECT task_id, depends_on FROM dependencies WHERE depends_on = ?")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;
        Ok(rows
            .into_iter()
            .map(|r| Dependency { task_id: TaskId::from(r.get::<String, _>("task_id")), depends_on: TaskId::from(r.get::<String, _>("depends_on")) })
            .collect())
    }

    async fn all_edges(&self) -> Result<Vec<Dependency>> {
        let rows = sqlx::query("SELECT task_id, depends_on FROM dependencies")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;
        Ok(rows
            .into_iter()
            .map(|r| Dependency { task_id: TaskId::from(r.get::<String, _>("task_id")), depends_on: TaskId::from(r.get::<String, _>("depends_on")) })
            .collect())
    }

    async fn add_edges(&self, edges: &[Dependency]) -> Result<()> {
        let existing = self.all_edges().await?;
        if task_core::dependency::would_create_cycle(&existing, edges) {
            let sample = edges.first().cloned().unwrap_or(Dependency {
                task_id: TaskId::from(""),
                depends_on: TaskId::from(""),
            });
            return Err(TaskError::CycleDetected(sample.task_id.to_string(), sample.depends_on.to_string()));
        }
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_task_error)?;
        for edge in edges {
            let target_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tasks WHERE id = ?")
                .bind(edge.depends_on.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(sqlx_error_to_task_error)?;
            if target_exists.is_none() {
                return Err(TaskError::dependency_violation(format!(
                    "depends_on target '{}' does not exist",
                    edge.depends_on
                )));
            }
            sqlx::query("INSERT OR IGNORE INTO dependencies (task_id, depends_on) VALUES (?, ?)")
                .bind(edge.task_id.as_str())
                .bind(edge.depends_on.as_str())
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_task_error)?;
        }
        tx.commit().await.map_err(sqlx_error_to_task_error)?;
        Ok(())
    }
}

#[async_trait]
impl ParticipantRepository for SqliteStore {
    async fn join(&self, task_id: &TaskId, agent_id: &str) -> Result<Participant> {
        let now = Utc::now();
        sqlx::query("INSERT OR IGNORE INTO participants (task_id, agent_id, joined_at) VALUES (?, ?, ?)")
            .bind(task_id.as_str())
            .bind(agent_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;

        let row = sqlx::query("SELECT joined_at FROM participants WHERE task_id = ? AND agent_id = ?")
            .bind(task_id.as_str())
            .bind(agent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;

        Ok(Participant { task_id: task_id.clone(), agent_id: agent_id.to_string(), joined_at: row.get("joined_at") })
    }

    async fn list(&self, task_id: &TaskId) -> Result<Vec<Participant>> {
        let rows = sqlx::query("SELECT agent_id, joined_at FROM participants WHERE task_id = ?")
            .bind(task_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;
        Ok(rows
            .into_iter()
            .map(|r| Participant { task_id: task_id.clone(), agent_id: r.get("agent_id"), joined_at: r.get("joined_at") })
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for SqliteStore {
    async fn emit(&self, agent_id: Option<&str>, task_id: Option<&TaskId>, kind: NotificationKind, message: &str) -> Result<Notification> {
        let now = Utc::now();
        let kind_str = kind.to_string();
        let id = sqlx::query(
            "INSERT INTO notifications (agent_id, task_id, kind, message, created_at, read) VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(agent_id)
        .bind(task_id.map(|t| t.as_str()))
        .bind(&kind_str)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_task_error)?
        .last_insert_rowid();

        Ok(Notification {
            id,
            agent_id: agent_id.map(str::to_string),
            task_id: task_id.cloned(),
            kind,
            message: message.to_string(),
            created_at: now,
            read: false,
        })
    }

    async fn watch(&self, agent_id: &str, limit: Option<u32>) -> Result<Vec<Notification>> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_task_error)?;

        let limit_clause = limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
        let query = format!(
            "SELECT id, agent_id, task_id, kind, message, created_at, read FROM notifications \
             WHERE read = 0 AND (agent_id = ? OR agent_id IS NULL) \
             ORDER BY created_at ASC, id ASC{limit_clause}"
        );
        let rows = sqlx::query(&query)
            .bind(agent_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(sqlx_error_to_task_error)?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.get("id");
            sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(sqlx_error_to_task_error)?;
            let kind_str: String = row.get("kind");
            notifications.push(Notification {
                id,
                agent_id: row.get("agent_id"),
                task_id: row.get::<Option<String>, _>("task_id").map(TaskId::from),
                kind: parse_kind(&kind_str)?,
                message: row.get("message"),
                created_at: row.get("created_at"),
                read: true,
            });
        }

        tx.commit().await.map_err(sqlx_error_to_task_error)?;
        Ok(notifications)
    }
}

fn parse_kind(s: &str) -> Result<NotificationKind> {
    match s {
        "unblocked" => Ok(NotificationKind::Unblocked),
        "impact" => Ok(NotificationKind::Impact),
        "discovery" => Ok(NotificationKind::Discovery),
        "completed" => Ok(NotificationKind::Completed),
        "sync" => Ok(NotificationKind::Sync),
        "context_updated" => Ok(NotificationKind::ContextUpdated),
        other => Err(TaskError::Corrupt(format!("invalid notification kind in database: {other}"))),
    }
}

#[async_trait]
impl SchemaRepository for SqliteStore {
    async fn current_version(&self) -> Result<i64> {
        let migrator = Migrator::new(&self.pool, self.db_path.clone(), PathBuf::from("backups"));
        migrator.current_version().await
    }

    async fn record_applied(&self, _version: SchemaVersion) -> Result<()> {
        // Migrations record their own version row transactionally; exposed
        // here only to satisfy the trait for callers that don't go through
        // `Migrator` directly (none currently do).
        Ok(())
    }

    async fn history(&self) -> Result<Vec<SchemaVersion>> {
        let rows = sqlx::query("SELECT version, applied_at, description FROM schema_version ORDER BY version")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_task_error)?;
        Ok(rows
            .into_iter()
            .map(|r| SchemaVersion { version: r.get("version"), applied_at: r.get("applied_at"), description: r.get("description") })
            .collect())
    }
}

#[async_trait]
impl MetricsRepository for SqliteStore {
    async fn feedback_summary(&self, period: Option<MetricsPeriod>) -> Result<FeedbackSummary> {
        let (from, to) = period_bounds(period);
        let rows = sqlx::query(
            "SELECT feedback_quality, feedback_timeliness, assignee, completed_at FROM tasks \
             WHERE status = 'completed' AND feedback_quality IS NOT NULL \
             AND (? IS NULL OR completed_at >= ?) AND (? IS NULL OR completed_at <= ?)",
        )
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_task_error)?;

        let mut summary = FeedbackSummary::default();
        let mut quality_sum = 0i64;
        let mut timeliness_sum = 0i64;
        let mut timeliness_n = 0i64;
        let n = rows.len() as i64;

        for row in &rows {
            let quality: i32 = row.get("feedback_quality");
            quality_sum += quality as i64;
            *summary.quality_distribution.entry(quality).or_insert(0) += 1;

            if let Some(timeliness) = row.get::<Option<i32>, _>("feedback_timeliness") {
                timeliness_sum += timeliness as i64;
                timeliness_n += 1;
                *summary.timeliness_distribution.entry(timeliness).or_insert(0) += 1;
            }

            if let Some(assignee) = row.get::<Option<String>, _>("assignee") {
                *summary.counts_by_assignee.entry(assignee).or_insert(0) += 1;
            }

            if let Some(completed_at) = row.get::<Option<chrono::DateTime<Utc>>, _>("completed_at") {
                *summary.monthly_trend.entry(task_core::metrics::month_bucket(completed_at)).or_insert(0) += 1;
            }
        }

        summary.average_quality = (n > 0).then(|| quality_sum as f64 / n as f64);
        summary.average_timeliness = (timeliness_n > 0).then(|| timeliness_sum as f64 / timeliness_n as f64);
        Ok(summary)
    }

    async fn time_summary(&self, period: Option<MetricsPeriod>) -> Result<TimeSummary> {
        let (from, to) = period_bounds(period);
        let rows = sqlx::query(
            "SELECT estimated_hours, actual_hours, assignee FROM tasks \
             WHERE status = 'completed' AND estimated_hours IS NOT NULL AND actual_hours IS NOT NULL \
             AND (? IS NULL OR completed_at >= ?) AND (? IS NULL OR completed_at <= ?)",
        )
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_task_error)?;

        let mut summary = TimeSummary::default();
        let mut accuracy_sum = 0.0;
        let mut by_assignee: BTreeMap<String, (f64, u64)> = BTreeMap::new();
        let n = rows.len();

        for row in &rows {
            let estimated: f64 = row.get("estimated_hours");
            let actual: f64 = row.get("actual_hours");
            summary.total_estimated_hours += estimated;
            summary.total_actual_hours += actual;
            accuracy_sum += task_core::metrics::estimation_accuracy(estimated, actual);
            if let Some(assignee) = row.get::<Option<String>, _>("assignee") {
                let entry = by_assignee.entry(assignee).or_insert((0.0, 0));
                entry.0 += actual;
                entry.1 += 1;
            }
        }

        summary.average_estimation_accuracy = (n > 0).then(|| accuracy_sum / n as f64);
        summary.average_actual_hours_by_assignee =
            by_assignee.into_iter().map(|(k, (total, count))| (k, total / count as f64)).collect();
        Ok(summary)
    }

    async fn adoption_summary(&self, period: Option<MetricsPeriod>) -> Result<AdoptionSummary> {
        let (from, to) = period_bounds(period);
        let row = sqlx::query(
            "SELECT COUNT(*) as completed_count, \
             SUM(CASE WHEN success_criteria != '[]' THEN 1 ELSE 0 END) as with_criteria, \
             SUM(CASE WHEN completion_summary IS NOT NULL THEN 1 ELSE 0 END) as with_summary, \
             SUM(CASE WHEN feedback_quality IS NOT NULL THEN 1 ELSE 0 END) as with_feedback \
             FROM tasks WHERE status = 'completed' \
             AND (? IS NULL OR completed_at >= ?) AND (? IS NULL OR completed_at <= ?)",
        )
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error_to_task_error)?;

        Ok(AdoptionSummary {
            completed_count: row.get::<i64, _>("completed_count") as u64,
            with_criteria: row.get::<Option<i64>, _>("with_criteria").unwrap_or(0) as u64,
            with_summary: row.get::<Option<i64>, _>("with_summary").unwrap_or(0) as u64,
            with_feedback: row.get::<Option<i64>, _>("with_feedback").unwrap_or(0) as u64,
        })
    }
}

fn period_bounds(period: Option<MetricsPeriod>) -> (Option<chrono::DateTime<Utc>>, Option<chrono::DateTime<Utc>>) {
    match period {
        None => (None, None),
        Some(MetricsPeriod::Week) => (Some(Utc::now() - chrono::Duration::weeks(1)), None),
        Some(MetricsPeriod::Month) => (Some(Utc::now() - chrono::Duration::days(30)), None),
        Some(MetricsPeriod::Range { from, to }) => (Some(from), Some(to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_core::models::{NewTask, TaskPriority, TaskStatus};

    async fn fresh_store() -> SqliteStore {
        let store = SqliteStore::connect(":memory:").await.unwrap();
        store.migrate(PathBuf::from("/tmp/task-orchestrator-test-backups")).await.unwrap();
        store
    }

    fn build_task(id: &str, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::from(id),
            title: "Design schema".to_string(),
            description: None,
            status,
            priority: TaskPriority::Medium,
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
    async fn insert_and_get_round_trips() {
        let store = fresh_store().await;
        let task = build_task("aaaaaaaa", TaskStatus::Pending);
        store.insert(task.clone(), &[]).await.unwrap();
        let fetched = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, task.title);
    }

    #[tokio::test]
    async fn insert_rejects_missing_dependency_target() {
        let store = fresh_store().await;
        let task = build_task("bbbbbbbb", TaskStatus::Blocked);
        let edges = vec![Dependency { task_id: task.id.clone(), depends_on: TaskId::from("missing0") }];
        let err = store.insert(task, &edges).await.unwrap_err();
        assert!(matches!(err, TaskError::DependencyViolation(_)));
    }

    #[tokio::test]
    async fn complete_unblocks_dependent() {
        let store = fresh_store().await;
        let a = build_task("a1111111", TaskStatus::Pending);
        store.insert(a.clone(), &[]).await.unwrap();

        let mut b = build_task("b2222222", TaskStatus::Blocked);
        b.title = "Implement API".to_string();
        let edges = vec![Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }];
        store.insert(b.clone(), &edges).await.unwrap();

        let (_, unblocked) = store.complete(&a.id, &CompleteOptions::default()).await.unwrap();
        assert_eq!(unblocked, vec![b.id.clone()]);

        let refreshed_b = store.get(&b.id).await.unwrap().unwrap();
        assert_eq!(refreshed_b.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn complete_is_idempotent_noop() {
        let store = fresh_store().await;
        let a = build_task("c3333333", TaskStatus::Pending);
        store.insert(a.clone(), &[]).await.unwrap();
        let (first, _) = store.complete(&a.id, &CompleteOptions::default()).await.unwrap();
        let (second, unblocked_again) = store.complete(&a.id, &CompleteOptions::default()).await.unwrap();
        assert_eq!(first.completed_at, second.completed_at);
        assert!(unblocked_again.is_empty());
    }

    #[tokio::test]
    async fn delete_fails_with_incoming_edge() {
        let store = fresh_store().await;
        let a = build_task("d4444444", TaskStatus::Pending);
        store.insert(a.clone(), &[]).await.unwrap();
        let b = build_task("e5555555", TaskStatus::Blocked);
        let edges = vec![Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }];
        store.insert(b, &edges).await.unwrap();

        let err = store.delete(&a.id).await.unwrap_err();
        assert!(matches!(err, TaskError::DependencyViolation(_)));
    }

    #[tokio::test]
    async fn feedback_requires_completion_and_is_single_shot() {
        let store = fresh_store().await;
        let a = build_task("f6666666", TaskStatus::Pending);
        store.insert(a.clone(), &[]).await.unwrap();

        let err = store
            .set_feedback(&a.id, FeedbackInput { quality: Some(5), timeliness: None, note: None })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));

        store.complete(&a.id, &CompleteOptions::default()).await.unwrap();
        store
            .set_feedback(&a.id, FeedbackInput { quality: Some(5), timeliness: Some(4), note: None })
            .await
            .unwrap();

        let err = store
            .set_feedback(&a.id, FeedbackInput { quality: Some(3), timeliness: None, note: None })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn notification_watch_is_exactly_once() {
        let store = fresh_store().await;
        store.emit(Some("agent-a"), None, NotificationKind::Unblocked, "unblocked").await.unwrap();
        let first = store.watch("agent-a", None).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = store.watch("agent-a", None).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn broadcast_notification_delivered_to_any_agent() {
        let store = fresh_store().await;
        store.emit(None, None, NotificationKind::Discovery, "found something").await.unwrap();
        let delivered = store.watch("whoever", None).await.unwrap();
        assert_eq!(delivered.len(), 1);
    }

    #[tokio::test]
    async fn add_edges_rejects_cycle() {
        let store = fresh_store().await;
        let a = build_task("g7777777", TaskStatus::Pending);
        let b = build_task("h8888888", TaskStatus::Pending);
        store.insert(a.clone(), &[]).await.unwrap();
        store.insert(b.clone(), &[]).await.unwrap();
        store
            .add_edges(&[Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }])
            .await
            .unwrap();
        let err = store
            .add_edges(&[Dependency { task_id: a.id.clone(), depends_on: b.id.clone() }])
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::CycleDetected(_, _)));
    }

    #[tokio::test]
    async fn concurrent_complete_exactly_one_unblock_set() {
        let store = fresh_store().await;
        let a = build_task("i9999999", TaskStatus::Pending);
        store.insert(a.clone(), &[]).await.unwrap();
        let b = build_task("j1010101", TaskStatus::Blocked);
        let edges = vec![Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }];
        store.insert(b.clone(), &edges).await.unwrap();

        let store1 = store.clone();
        let store2 = store.clone();
        let id1 = a.id.clone();
        let id2 = a.id.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { store1.complete(&id1, &CompleteOptions::default()).await }),
            tokio::spawn(async move { store2.complete(&id2, &CompleteOptions::default()).await }),
        );
        let (_, unblocked1) = r1.unwrap().unwrap();
        let (_, unblocked2) = r2.unwrap().unwrap();
        assert_eq!(unblocked1.len() + unblocked2.len(), 1);
    }
}
