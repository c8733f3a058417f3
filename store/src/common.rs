use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use task_core::{
    error::{Result, TaskError},
    models::{FileRef, SuccessCriterion, Task, TaskFilter, TaskId, TaskPriority, TaskStatus},
};

pub fn status_to_string(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Cancelled => "cancelled",
    }
}

pub fn string_to_status(s: &str) -> Result<TaskStatus> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "in_progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        "blocked" => Ok(TaskStatus::Blocked),
        "cancelled" => Ok(TaskStatus::Cancelled),
        other => Err(TaskError::Corrupt(format!("invalid task status in database: {other}"))),
    }
}

pub fn priority_to_string(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Medium => "medium",
        TaskPriority::High => "high",
        TaskPriority::Critical => "critical",
    }
}

pub fn string_to_priority(s: &str) -> Result<TaskPriority> {
    match s {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        "critical" => Ok(TaskPriority::Critical),
        other => Err(TaskError::Corrupt(format!("invalid task priority in database: {other}"))),
    }
}

/// Convert a SQLite row to a [`Task`]. `success_criteria` and `file_refs`
/// are stored as JSON text columns and parsed here; malformed JSON is a
/// store-level bug, not a user error, so it maps to `Corrupt`.
pub fn row_to_task(row: &SqliteRow) -> Result<Task> {
    let id: String = row.get("id");
    let status_str: String = row.get("status");
    let priority_str: String = row.get("priority");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    let completed_at: Option<DateTime<Utc>> = row.get("completed_at");
    let deadline: Option<DateTime<Utc>> = row.get("deadline");

    let success_criteria_json: String = row.try_get("success_criteria").unwrap_or_else(|_| "[]".to_string());
    let success_criteria: Vec<SuccessCriterion> = serde_json::from_str(&success_criteria_json)
        .map_err(|e| TaskError::Corrupt(format!("success_criteria JSON corrupt for {id}: {e}")))?;

    let file_refs_json: String = row.try_get("file_refs").unwrap_or_else(|_| "[]".to_string());
    let file_refs: Vec<FileRef> = serde_json::from_str(&file_refs_json)
        .map_err(|e| TaskError::Corrupt(format!("file_refs JSON corrupt for {id}: {e}")))?;

    Ok(Task {
        id: TaskId::from(id),
        title: row.get("title"),
        description: row.get("description"),
        status: string_to_status(&status_str)?,
        priority: string_to_priority(&priority_str)?,
        assignee: row.get("assignee"),
        created_by: row.get("created_by"),
        created_at,
        updated_at,
        completed_at,
        success_criteria,
        feedback_quality: row.get("feedback_quality"),
        feedback_timeliness: row.get("feedback_timeliness"),
        feedback_notes: row.get("feedback_notes"),
        completion_summary: row.get("completion_summary"),
        deadline,
        estimated_hours: row.get("estimated_hours"),
        actual_hours: row.get("actual_hours"),
        file_refs,
    })
}

pub fn sqlx_error_to_task_error(err: sqlx::Error) -> TaskError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed") {
                TaskError::Internal(format!("unexpected unique-constraint violation: {message}"))
            } else if message.contains("FOREIGN KEY constraint failed") {
                TaskError::dependency_violation("referenced task does not exist")
            } else {
                TaskError::Internal(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::PoolTimedOut => TaskError::StoreBusy("connection pool timed out".to_string()),
        sqlx::Error::Io(io_err) => TaskError::Internal(format!("database I/O error: {io_err}")),
        _ => TaskError::Internal(format!("database operation failed: {err}")),
    }
}

/// Dynamic WHERE-clause builder for `TaskCore::list` (§4.4).
pub fn build_filter_query(filter: &TaskFilter) -> sqlx::QueryBuilder<'static, sqlx::Sqlite> {
    let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new(
        "SELECT id, title, description, status, priority, assignee, created_by, created_at, \
         updated_at, completed_at, success_criteria, feedback_quality, feedback_timeliness, \
         feedback_notes, completion_summary, deadline, estimated_hours, actual_hours, file_refs \
         FROM tasks",
    );

    let mut has_conditions = false;
    macro_rules! clause {
        () => {
            if has_conditions {
                qb.push(" AND ");
            } else {
                qb.push(" WHERE ");
                has_conditions = true;
            }
        };
    }

    if let Some(status) = filter.status {
        clause!();
        qb.push("status = ");
        qb.push_bind(status_to_string(status));
    }
    if let Some(ref assignee) = filter.assignee {
        clause!();
        qb.push("assignee = ");
        qb.push_bind(assignee.clone());
    }
    if let Some(priority) = filter.priority {
        clause!();
        qb.push("priority = ");
        qb.push_bind(priority_to_string(priority));
    }
    if let Some(has_deps) = filter.has_deps {
        clause!();
        if has_deps {
            qb.push("EXISTS (SELECT 1 FROM dependencies d WHERE d.task_id = tasks.id)");
        } else {
            qb.push("NOT EXISTS (SELECT 1 FROM dependencies d WHERE d.task_id = tasks.id)");
        }
    }
    if let Some(ref needle) = filter.file_ref_contains {
        clause!();
        qb.push("file_refs LIKE ");
        qb.push_bind(format!("%{needle}%"));
    }
    if let Some(from) = filter.deadline_from {
        clause!();
        qb.push("deadline >= ");
        qb.push_bind(from);
    }
    if let Some(to) = filter.deadline_to {
        clause!();
        qb.push("deadline <= ");
        qb.push_bind(to);
    }

    qb.push(" ORDER BY created_at ASC");

    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
    }
    if let Some(offset) = filter.offset {
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);
    }

    qb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Blocked,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(string_to_status(status_to_string(s)).unwrap(), s);
        }
    }

    #[test]
    fn priority_round_trips() {
        for p in [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High, TaskPriority::Critical] {
            assert_eq!(string_to_priority(priority_to_string(p)).unwrap(), p);
        }
    }

    #[test]
    fn unknown_status_is_corrupt_not_panic() {
        assert!(string_to_status("sideways").is_err());
    }
}
