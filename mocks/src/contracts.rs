//! Contract test helpers for validating trait implementations.
//!
//! Runs the same behavioral contract as `task-store`'s SQLite-backed suite
//! against any `TaskRepository`, so the in-memory mock and the real store
//! are held to one standard.

use crate::generators::generate_task_id;
use task_core::error::TaskError;
use task_core::models::{CompleteOptions, Dependency, FeedbackInput, TaskFilter, TaskId, TaskPatch, TaskStatus};
use task_core::repository::{DependencyRepository, TaskRepository};

use crate::builders::TaskBuilder;

/// Runs the full repository contract suite against `repo`.
pub async fn test_repository_contract<R: TaskRepository + DependencyRepository>(repo: &R) {
    test_insert_contract(repo).await;
    test_patch_contract(repo).await;
    test_complete_contract(repo).await;
    test_delete_contract(repo).await;
    test_list_contract(repo).await;
    test_assign_contract(repo).await;
    test_feedback_contract(repo).await;
    test_dependency_contract(repo).await;
}

async fn test_insert_contract<R: TaskRepository>(repo: &R) {
    let id = generate_task_id();
    let task = TaskBuilder::new().with_id(id.as_str().to_string()).with_title("Insert contract").build();
    let inserted = repo.insert(task.clone(), &[]).await.expect("insert should succeed");
    assert_eq!(inserted.id, task.id);
    assert_eq!(inserted.status, TaskStatus::Pending);

    let fetched = repo.get(&id).await.expect("get should succeed").expect("task should exist");
    assert_eq!(fetched.title, "Insert contract");

    let missing = repo.get(&TaskId::from("ffffff01")).await.expect("get should succeed");
    assert!(missing.is_none(), "should return none for unknown id");
}

async fn test_patch_contract<R: TaskRepository>(repo: &R) {
    let id = generate_task_id();
    let task = TaskBuilder::new().with_id(id.as_str().to_string()).build();
    repo.insert(task, &[]).await.expect("insert should succeed");

    let patch = TaskPatch { title: Some("Patched".to_string()), ..Default::default() };
    let patched = repo.apply_patch(&id, patch).await.expect("patch should succeed");
    assert_eq!(patched.title, "Patched");

    let missing = TaskId::from("ffffff02");
    let err = repo.apply_patch(&missing, TaskPatch::default()).await.unwrap_err();
    assert!(matches!(err, TaskError::NotFound(_)), "expected NotFound, got {err:?}");
}

async fn test_complete_contract<R: TaskRepository>(repo: &R) {
    let id = generate_task_id();
    let task = TaskBuilder::new().with_id(id.as_str().to_string()).build();
    repo.insert(task, &[]).await.expect("insert should succeed");

    let (completed, unblocked) =
        repo.complete(&id, &CompleteOptions::default()).await.expect("complete should succeed");
    assert_eq!(completed.status, TaskStatus::Completed);
    assert!(unblocked.is_empty(), "a task with no dependents unblocks nothing");

    let (completed_again, unblocked_again) =
        repo.complete(&id, &CompleteOptions::default()).await.expect("re-completing is idempotent");
    assert_eq!(completed_again.status, TaskStatus::Completed);
    assert!(unblocked_again.is_empty());
}

async fn test_delete_contract<R: TaskRepository>(repo: &R) {
    let id = generate_task_id();
    let task = TaskBuilder::new().with_id(id.as_str().to_string()).build();
    repo.insert(task, &[]).await.expect("insert should succeed");
    repo.delete(&id).await.expect("delete should succeed");
    assert!(repo.get(&id).await.expect("get should succeed").is_none());

    let err = repo.delete(&id).await.unwrap_err();
    assert!(matches!(err, TaskError::NotFound(_)), "expected NotFound, got {err:?}");
}

async fn test_list_contract<R: TaskRepository>(repo: &R) {
    let pending_id = generate_task_id();
    let completed_id = generate_task_id();
    repo.insert(TaskBuilder::new().with_id(pending_id.as_str().to_string()).build(), &[])
        .await
        .expect("insert should succeed");
    repo.insert(TaskBuilder::new().with_id(completed_id.as_str().to_string()).build(), &[])
        .await
        .expect("insert should succeed");
    repo.complete(&completed_id, &CompleteOptions::default()).await.expect("complete should succeed");

    let pending = repo
        .list(TaskFilter { status: Some(TaskStatus::Pending), ..Default::default() })
        .await
        .expect("list should succeed");
    assert!(pending.iter().all(|t| t.status == TaskStatus::Pending));
    assert!(pending.iter().any(|t| t.id == pending_id));
    assert!(!pending.iter().any(|t| t.id == completed_id));
}

async fn test_assign_contract<R: TaskRepository>(repo: &R) {
    let id = generate_task_id();
    repo.insert(TaskBuilder::new().with_id(id.as_str().to_string()).build(), &[])
        .await
        .expect("insert should succeed");

    let assigned = repo.assign(&id, "new-owner").await.expect("assign should succeed");
    assert_eq!(assigned.assignee.as_deref(), Some("new-owner"));

    let err = repo.assign(&TaskId::from("ffffff03"), "whoever").await.unwrap_err();
    assert!(matches!(err, TaskError::NotFound(_)), "expected NotFound, got {err:?}");
}

async fn test_feedback_contract<R: TaskRepository>(repo: &R) {
    let pending_id = generate_task_id();
    repo.insert(TaskBuilder::new().with_id(pending_id.as_str().to_string()).build(), &[])
        .await
        .expect("insert should succeed");

    let premature = repo
        .set_feedback(&pending_id, FeedbackInput { quality: Some(5), timeliness: None, note: None })
        .await
        .unwrap_err();
    assert!(matches!(premature, TaskError::IllegalTransition(_)));

    repo.complete(&pending_id, &CompleteOptions::default()).await.expect("complete should succeed");
    let with_feedback = repo
        .set_feedback(&pending_id, FeedbackInput { quality: Some(5), timeliness: Some(4), note: None })
        .await
        .expect("feedback should succeed");
    assert_eq!(with_feedback.feedback_quality, Some(5));

    let second_attempt = repo
        .set_feedback(&pending_id, FeedbackInput { quality: Some(1), timeliness: None, note: None })
        .await
        .unwrap_err();
    assert!(matches!(second_attempt, TaskError::IllegalTransition(_)), "feedback must be single-shot");
}

async fn test_dependency_contract<R: TaskRepository + DependencyRepository>(repo: &R) {
    let a = generate_task_id();
    let b = generate_task_id();
    repo.insert(TaskBuilder::new().with_id(a.as_str().to_string()).build(), &[])
        .await
        .expect("insert should succeed");
    repo.insert(
        TaskBuilder::new().with_id(b.as_str().to_string()).with_status(TaskStatus::Blocked).build(),
        &[Dependency { task_id: b.clone(), depends_on: a.clone() }],
    )
    .await
    .expect("insert should succeed");

    let cycle = repo.add_edges(&[Dependency { task_id: a.clone(), depends_on: b.clone() }]).await;
    assert!(matches!(cycle.unwrap_err(), TaskError::CycleDetected(_, _)));

    let (_, unblocked) = repo.complete(&a, &CompleteOptions::default()).await.expect("complete should succeed");
    assert_eq!(unblocked, vec![b.clone()]);
}
