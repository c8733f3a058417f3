//! Integration tests for the mocks crate.
//!
//! Tests the mock implementations and utilities to ensure they work
//! correctly and provide the expected testing capabilities.

use task_core::models::{CompleteOptions, TaskId, TaskStatus};
use task_core::repository::TaskRepository;
use task_core::TaskError;
use task_mocks::*;

#[tokio::test]
async fn mock_repository_basic_operations() {
    let repo = MockTaskRepository::new();

    let task = create_test_task();
    let inserted = repo.insert(task.clone(), &[]).await.unwrap();
    assert_eq!(inserted.id, task.id);
    assert_eq!(inserted.status, TaskStatus::Pending);
    repo.assert_called("insert");

    let retrieved = repo.get(&task.id).await.unwrap().unwrap();
    assert_eq!(retrieved.id, task.id);
    repo.assert_called("get");
}

#[tokio::test]
async fn mock_repository_error_injection() {
    let repo = MockTaskRepository::new();
    repo.inject_error(TaskError::not_found("simulated"));

    let result = repo.get(&TaskId::from("aaaaaaaa")).await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), TaskError::NotFound(_)));

    let result = repo.get(&TaskId::from("aaaaaaaa")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn mock_repository_completion_unblocks_dependents() {
    let repo = MockTaskRepository::new();
    let a = create_test_task_with_status(TaskStatus::Pending);
    let mut b = create_test_task_with_status(TaskStatus::Blocked);
    b.id = TaskId::from("bbbb0001");

    repo.insert(a.clone(), &[]).await.unwrap();
    repo.insert(
        b.clone(),
        &[task_core::models::Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }],
    )
    .await
    .unwrap();

    let (_, unblocked) = repo.complete(&a.id, &CompleteOptions::default()).await.unwrap();
    assert_eq!(unblocked, vec![b.id]);
}

#[tokio::test]
async fn fixtures_create_tasks_in_all_statuses() {
    let tasks = create_tasks_in_all_statuses();
    assert_eq!(tasks.len(), 5);

    let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
    assert!(statuses.contains(&TaskStatus::Pending));
    assert!(statuses.contains(&TaskStatus::InProgress));
    assert!(statuses.contains(&TaskStatus::Blocked));
    assert!(statuses.contains(&TaskStatus::Completed));
    assert!(statuses.contains(&TaskStatus::Cancelled));

    let completed: Vec<_> = tasks.iter().filter(|t| t.status == TaskStatus::Completed).collect();
    assert!(completed[0].completed_at.is_some());
}

#[tokio::test]
async fn builders_task_builder() {
    let task = TaskBuilder::new()
        .with_id("deadbeef")
        .with_title("Built Task")
        .with_status(TaskStatus::InProgress)
        .with_assignee("builder-agent")
        .build();

    assert_eq!(task.id, TaskId::from("deadbeef"));
    assert_eq!(task.title, "Built Task");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.assignee.as_deref(), Some("builder-agent"));
}

#[tokio::test]
async fn assertions_task_equals() {
    let task1 = create_test_task();
    let mut task2 = task1.clone();
    assert_task_equals(&task1, &task2);

    task2.title = "Different Title".to_string();
    let result = std::panic::catch_unwind(|| {
        assert_task_equals(&task1, &task2);
    });
    assert!(result.is_err());
}

#[tokio::test]
async fn generators_realistic_data() {
    let task = generate_random_task();
    assert_eq!(task.id.as_str().len(), 8);
    assert!(!task.title.is_empty());
    assert!(task.description.as_deref().is_some_and(|d| !d.is_empty()));
    assert!(task.assignee.is_some());
}

#[tokio::test]
async fn mock_repository_concurrent_inserts_stay_unique() {
    use std::sync::Arc;
    use tokio::task::JoinSet;

    let repo = Arc::new(MockTaskRepository::new());
    let mut set = JoinSet::new();

    for i in 0..10 {
        let repo = repo.clone();
        set.spawn(async move {
            let id = generate_task_id();
            let task = TaskBuilder::new().with_id(id.as_str().to_string()).with_title(format!("Concurrent {i}")).build();
            repo.insert(task, &[]).await.unwrap()
        });
    }

    let mut tasks = Vec::new();
    while let Some(result) = set.join_next().await {
        tasks.push(result.unwrap());
    }

    assert_eq!(tasks.len(), 10);
    let mut ids: Vec<_> = tasks.iter().map(|t| t.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn mock_repository_metrics_reflect_completed_tasks() {
    use task_core::repository::MetricsRepository;

    let repo = MockTaskRepository::new();
    let mut task = create_test_task();
    task.estimated_hours = Some(8.0);
    repo.insert(task.clone(), &[]).await.unwrap();
    repo.complete(&task.id, &CompleteOptions { actual_hours: Some(10.0), ..Default::default() }).await.unwrap();

    let adoption = repo.adoption_summary(None).await.unwrap();
    assert_eq!(adoption.completed_count, 1);

    let time = repo.time_summary(None).await.unwrap();
    assert_eq!(time.total_estimated_hours, 8.0);
    assert_eq!(time.total_actual_hours, 10.0);
}

#[tokio::test]
async fn contract_tests_pass_against_mock() {
    let repo = MockTaskRepository::new();
    test_repository_contract(&repo).await;

    let history = repo.call_history();
    assert!(!history.is_empty(), "mock should have recorded method calls");
    assert!(history.iter().any(|call| call.contains("insert")));
    assert!(history.iter().any(|call| call.contains("complete")));
}
