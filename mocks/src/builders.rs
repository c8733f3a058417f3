//! Builder pattern implementations for easy test data construction.
//!
//! Provides fluent builders for:
//! - Task construction with sensible defaults
//! - NewTask and TaskPatch variants
//! - Filter construction for query testing

use chrono::{DateTime, Utc};
use task_core::models::{NewTask, Task, TaskFilter, TaskId, TaskPatch, TaskPriority, TaskStatus};

/// Builder for constructing `Task` instances in tests.
pub struct TaskBuilder {
    task: Task,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            task: Task {
                id: TaskId::from("00000001"),
                title: "Test Task".to_string(),
                description: Some("A test task".to_string()),
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
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.task.id = TaskId::from(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.task.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.task.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        if status == TaskStatus::Completed && self.task.completed_at.is_none() {
            self.task.completed_at = Some(Utc::now());
        }
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.task.assignee = Some(assignee.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self
    }

    pub fn with_completed_at(mut self, completed_at: Option<DateTime<Utc>>) -> Self {
        self.task.completed_at = completed_at;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.task.deadline = Some(deadline);
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.task.estimated_hours = Some(hours);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for constructing `NewTask` instances in tests.
pub struct NewTaskBuilder {
    new_task: NewTask,
}

impl Default for NewTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewTaskBuilder {
    pub fn new() -> Self {
        Self {
            new_task: NewTask {
                title: "New Test Task".to_string(),
                description: Some("A new test task".to_string()),
                created_by: Some("test-agent".to_string()),
                ..Default::default()
            },
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.new_task.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.new_task.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.new_task.priority = Some(priority);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.new_task.assignee = Some(assignee.into());
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<TaskId>) -> Self {
        self.new_task.depends_on = depends_on;
        self
    }

    pub fn build(self) -> NewTask {
        self.new_task
    }
}

/// Builder for constructing `TaskPatch` instances in tests.
pub struct TaskPatchBuilder {
    patch: TaskPatch,
}

impl Default for TaskPatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPatchBuilder {
    pub fn new() -> Self {
        Self { patch: TaskPatch::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.patch.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.patch.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.patch.status = Some(status);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.patch.assignee = Some(assignee.into());
        self
    }

    pub fn build(self) -> TaskPatch {
        self.patch
    }
}

/// Builder for constructing `TaskFilter` instances in tests.
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl Default for TaskFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilterBuilder {
    pub fn new() -> Self {
        Self { filter: TaskFilter::default() }
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.filter.assignee = Some(assignee.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.filter.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.filter.priority = Some(priority);
        self
    }

    pub fn with_deadline_from(mut self, deadline_from: DateTime<Utc>) -> Self {
        self.filter.deadline_from = Some(deadline_from);
        self
    }

    pub fn with_deadline_to(mut self, deadline_to: DateTime<Utc>) -> Self {
        self.filter.deadline_to = Some(deadline_to);
        self
    }

    pub fn build(self) -> TaskFilter {
        self.filter
    }
}
