//! Standard test fixtures for consistent testing.
//!
//! Provides pre-built test data including:
//! - Standard tasks in various statuses
//! - Bulk task generators
//! - `NewTask`/`TaskPatch` fixtures

use chrono::Utc;
use task_core::models::{NewTask, Task, TaskId, TaskPatch, TaskPriority, TaskStatus};

/// Creates a basic test task with sensible defaults.
pub fn create_test_task() -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::from("aaaa0001"),
        title: "Test Task".to_string(),
        description: Some("A standard test task with default values".to_string()),
        status: TaskStatus::Pending,
        priority: TaskPriority::Medium,
        assignee: Some("test-agent".to_string()),
        created_by: "test-agent".to_string(),
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

pub fn create_test_task_with_status(status: TaskStatus) -> Task {
    let mut task = create_test_task();
    task.status = status;
    if status == TaskStatus::Completed {
        task.completed_at = Some(Utc::now());
    }
    task
}

pub fn create_test_task_with_assignee(assignee: &str) -> Task {
    let mut task = create_test_task();
    task.assignee = Some(assignee.to_string());
    task
}

/// Creates `count` unique tasks with ids `bbbb0001`, `bbbb0002`, ... and
/// statuses cycling through pending/in-progress/blocked/completed.
pub fn create_test_tasks(count: usize) -> Vec<Task> {
    (1..=count)
        .map(|i| {
            let status = match i % 4 {
                0 => TaskStatus::Pending,
                1 => TaskStatus::InProgress,
                2 => TaskStatus::Blocked,
                _ => TaskStatus::Completed,
            };
            let now = Utc::now();
            Task {
                id: TaskId::from(format!("bbbb{i:04}")),
                title: format!("Test Task {i}"),
                description: Some(format!("Test task number {i} for bulk testing")),
                status,
                priority: TaskPriority::Medium,
                assignee: Some(format!("agent-{}", i % 3 + 1)),
                created_by: "test-agent".to_string(),
                created_at: now,
                updated_at: now,
                completed_at: if status == TaskStatus::Completed { Some(now) } else { None },
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
        })
        .collect()
}

/// One task in each possible status.
pub fn create_tasks_in_all_statuses() -> Vec<Task> {
    [
        ("cccc0001", TaskStatus::Pending),
        ("cccc0002", TaskStatus::InProgress),
        ("cccc0003", TaskStatus::Blocked),
        ("cccc0004", TaskStatus::Completed),
        ("cccc0005", TaskStatus::Cancelled),
    ]
    .into_iter()
    .map(|(id, status)| {
        let now = Utc::now();
        Task {
            id: TaskId::from(id),
            title: format!("{status} task"),
            description: Some(format!("Task in {status} status")),
            status,
            priority: TaskPriority::Medium,
            assignee: Some("test-agent".to_string()),
            created_by: "test-agent".to_string(),
            created_at: now,
            updated_at: now,
            completed_at: if status == TaskStatus::Completed { Some(now) } else { None },
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
    })
    .collect()
}

/// A standard `NewTask` for testing creation.
pub fn create_new_task() -> NewTask {
    NewTask {
        title: "New Test Task".to_string(),
        description: Some("A new task for testing creation".to_string()),
        created_by: Some("test-agent".to_string()),
        ..Default::default()
    }
}

pub fn create_new_task_with_title(title: &str) -> NewTask {
    let mut task = create_new_task();
    task.title = title.to_string();
    task
}

/// A standard `TaskPatch` for testing updates.
pub fn create_task_patch() -> TaskPatch {
    TaskPatch {
        title: Some("Updated Task Name".to_string()),
        description: Some("Updated task description".to_string()),
        assignee: Some("updated-agent".to_string()),
        ..Default::default()
    }
}

pub fn create_task_patch_with_title(title: &str) -> TaskPatch {
    TaskPatch { title: Some(title.to_string()), ..Default::default() }
}
