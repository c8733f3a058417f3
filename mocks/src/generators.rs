//! Random test data generators using the fake crate.
//!
//! Provides realistic random data including:
//! - Task ids in the real 8-hex-character format
//! - Agent names from a realistic pool
//! - Task titles and descriptions
//! - Property-based testing strategies

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use proptest::prelude::*;
use rand::Rng;
use task_core::models::{Task, TaskFilter, TaskId, TaskPriority, TaskStatus};

/// Generates an 8-lowercase-hex task id, the same shape the store assigns.
pub fn generate_task_id() -> TaskId {
    let value: u32 = rand::thread_rng().gen();
    TaskId::from(format!("{value:08x}"))
}

/// Generates a realistic agent name.
pub fn generate_agent_name() -> String {
    let agents = [
        "rust-architect",
        "database-engineer",
        "protocol-specialist",
        "integration-lead",
        "testing-expert",
        "documentation-specialist",
        "project-finalizer",
        "security-auditor",
        "performance-optimizer",
    ];
    agents[rand::thread_rng().gen_range(0..agents.len())].to_string()
}

pub fn generate_task_title() -> String {
    Sentence(3..8).fake()
}

pub fn generate_task_description() -> String {
    Paragraph(2..5).fake()
}

pub fn generate_random_priority() -> TaskPriority {
    let priorities = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High, TaskPriority::Critical];
    priorities[rand::thread_rng().gen_range(0..priorities.len())]
}

pub fn generate_random_status() -> TaskStatus {
    let statuses = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];
    statuses[rand::thread_rng().gen_range(0..statuses.len())]
}

/// Generates a random task with realistic data and no dependency edges.
pub fn generate_random_task() -> Task {
    let status = generate_random_status();
    let now = Utc::now();
    Task {
        id: generate_task_id(),
        title: generate_task_title(),
        description: Some(generate_task_description()),
        status,
        priority: generate_random_priority(),
        assignee: Some(generate_agent_name()),
        created_by: generate_agent_name(),
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
}

/// Configurable task generator for bulk fixture creation.
pub struct TaskGenerator {
    pub agent_pool: Vec<String>,
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGenerator {
    pub fn new() -> Self {
        Self {
            agent_pool: vec!["agent-1".to_string(), "agent-2".to_string(), "agent-3".to_string()],
        }
    }

    pub fn generate(&self) -> Task {
        let agent = self.agent_pool[rand::thread_rng().gen_range(0..self.agent_pool.len())].clone();
        let mut task = generate_random_task();
        task.assignee = Some(agent);
        task
    }
}

/// Proptest strategy for generating valid task ids.
pub fn task_id_strategy() -> impl Strategy<Value = TaskId> {
    "[a-f0-9]{8}".prop_map(TaskId::from)
}

pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Blocked),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Cancelled),
    ]
}

pub fn task_priority_strategy() -> impl Strategy<Value = TaskPriority> {
    prop_oneof![
        Just(TaskPriority::Low),
        Just(TaskPriority::Medium),
        Just(TaskPriority::High),
        Just(TaskPriority::Critical),
    ]
}

/// Proptest strategy for generating complete tasks.
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (
        task_id_strategy(),
        "[A-Za-z ]{5,50}",
        "[A-Za-z0-9 .,!?]{10,200}",
        "[a-z-]{5,20}",
        task_status_strategy(),
        task_priority_strategy(),
    )
        .prop_map(|(id, title, description, owner, status, priority)| {
            let now = Utc::now();
            Task {
                id,
                title,
                description: Some(description),
                status,
                priority,
                assignee: Some(owner),
                created_by: "proptest-agent".to_string(),
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
}

/// Proptest strategy for generating task filters.
pub fn task_filter_strategy() -> impl Strategy<Value = TaskFilter> {
    (proptest::option::of("[a-z-]{5,20}"), proptest::option::of(task_status_strategy()))
        .prop_map(|(assignee, status)| TaskFilter { assignee, status, ..Default::default() })
}
