//! Custom assertion helpers for testing.
//!
//! Provides specialized assertions for:
//! - Task equality with clear error messages
//! - Dependency-graph-aware status validation
//! - Collection-based assertions

use task_core::dependency::compute_status;
use task_core::models::{Dependency, Task, TaskId, TaskStatus};

/// Asserts tasks are equal ignoring timestamps.
pub fn assert_task_equals(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "task ids don't match");
    assert_eq!(actual.title, expected.title, "task titles don't match");
    assert_eq!(actual.description, expected.description, "task descriptions don't match");
    assert_eq!(actual.assignee, expected.assignee, "task assignees don't match");
    assert_eq!(actual.status, expected.status, "task statuses don't match");
    assert_eq!(actual.priority, expected.priority, "task priorities don't match");
}

/// Asserts tasks are equal including exact timestamps.
pub fn assert_task_equals_exact(actual: &Task, expected: &Task) {
    assert_eq!(actual, expected, "tasks are not exactly equal");
}

/// Asserts a task matches partial criteria.
pub fn assert_task_matches(task: &Task, matcher: &TaskMatcher) {
    if let Some(ref expected_id) = matcher.id {
        assert_eq!(task.id, *expected_id, "task id doesn't match expected");
    }
    if let Some(ref expected_title) = matcher.title {
        assert_eq!(task.title, *expected_title, "task title doesn't match expected");
    }
    if let Some(ref expected_assignee) = matcher.assignee {
        assert_eq!(task.assignee, Some(expected_assignee.clone()), "task assignee doesn't match expected");
    }
    if let Some(expected_status) = matcher.status {
        assert_eq!(task.status, expected_status, "task status doesn't match expected");
    }
}

/// Asserts that, given a task's outbound edges and dependency statuses, the
/// computed status matches what the task currently carries.
pub fn assert_status_consistent_with_dependencies(
    task: &Task,
    outbound: &[Dependency],
    dependency_statuses: impl Fn(&TaskId) -> Option<TaskStatus>,
) {
    if task.status == TaskStatus::Completed || task.status == TaskStatus::Cancelled {
        return;
    }
    let expected = compute_status(outbound, dependency_statuses);
    assert_eq!(
        task.status, expected,
        "task {} has status {:?} but its dependency graph implies {:?}",
        task.id, task.status, expected
    );
}

/// Asserts a task list contains a task with the given id.
pub fn assert_contains_task_with_id(tasks: &[Task], id: &str) {
    assert!(
        tasks.iter().any(|t| t.id.as_str() == id),
        "expected to find task with id '{}' in task list, but it wasn't found. available ids: {:?}",
        id,
        tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>()
    );
}

/// Asserts tasks are sorted by `Task::ordering_key` (priority desc, deadline
/// asc, created_at asc, id asc).
pub fn assert_tasks_sorted_by_ordering_key(tasks: &[Task]) {
    for window in tasks.windows(2) {
        assert!(
            window[0].ordering_key() <= window[1].ordering_key(),
            "tasks are not sorted by ordering key: '{}' comes before '{}' out of order",
            window[0].id,
            window[1].id
        );
    }
}

/// Flexible task matcher for partial assertions.
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub id: Option<TaskId>,
    pub title: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(TaskId::from(id.into()));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }
}
