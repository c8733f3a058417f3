use std::path::PathBuf;

use task_core::models::{
    CompleteOptions, Dependency, NotificationKind, TaskFilter, TaskId, TaskPriority, TaskStatus,
};
use task_core::repository::{DependencyRepository, MetricsRepository, NotificationRepository, TaskRepository};
use task_core::TaskError;
use task_store::SqliteStore;

use contract::sample_task;

async fn create_test_store() -> SqliteStore {
    let store = SqliteStore::connect(":memory:").await.unwrap();
    let backups = std::env::temp_dir().join(format!("task-orchestrator-test-{}", std::process::id()));
    store.migrate(backups).await.unwrap();
    store
}

#[tokio::test]
async fn dependency_chain_blocks_then_unblocks_in_order() {
    let store = create_test_store().await;

    let design = sample_task("d0000001", TaskStatus::Pending);
    store.insert(design.clone(), &[]).await.unwrap();

    let mut implement = sample_task("d0000002", TaskStatus::Blocked);
    implement.title = "Implement".to_string();
    let edges = vec![Dependency { task_id: implement.id.clone(), depends_on: design.id.clone() }];
    store.insert(implement.clone(), &edges).await.unwrap();

    let fetched = store.get(&implement.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, TaskStatus::Blocked);

    let (_, unblocked) = store.complete(&design.id, &CompleteOptions::default()).await.unwrap();
    assert_eq!(unblocked, vec![implement.id.clone()]);

    let fetched = store.get(&implement.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, TaskStatus::Pending);
}

#[tokio::test]
async fn add_edges_rejects_cycle_across_existing_and_proposed() {
    let store = create_test_store().await;
    let a = sample_task("d0000003", TaskStatus::Pending);
    let b = sample_task("d0000004", TaskStatus::Pending);
    let c = sample_task("d0000005", TaskStatus::Pending);
    store.insert(a.clone(), &[]).await.unwrap();
    store.insert(b.clone(), &[]).await.unwrap();
    store.insert(c.clone(), &[]).await.unwrap();

    store.add_edges(&[Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }]).await.unwrap();
    store.add_edges(&[Dependency { task_id: c.id.clone(), depends_on: b.id.clone() }]).await.unwrap();

    let err = store
        .add_edges(&[Dependency { task_id: a.id.clone(), depends_on: c.id.clone() }])
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::CycleDetected(_, _)));
}

#[tokio::test]
async fn list_orders_by_priority_then_deadline_then_id() {
    let store = create_test_store().await;

    let mut low = sample_task("e0000001", TaskStatus::Pending);
    low.priority = TaskPriority::Low;
    let mut critical = sample_task("e0000002", TaskStatus::Pending);
    critical.priority = TaskPriority::Critical;
    let mut medium = sample_task("e0000003", TaskStatus::Pending);
    medium.priority = TaskPriority::Medium;

    store.insert(low.clone(), &[]).await.unwrap();
    store.insert(critical.clone(), &[]).await.unwrap();
    store.insert(medium.clone(), &[]).await.unwrap();

    let listed = store.list(TaskFilter::default()).await.unwrap();
    let mut ordered = listed.clone();
    ordered.sort_by_key(|t| t.ordering_key());
    assert_eq!(ordered.first().unwrap().id, critical.id);
}

#[tokio::test]
async fn deleting_a_task_with_dependents_is_rejected() {
    let store = create_test_store().await;
    let a = sample_task("f0000001", TaskStatus::Pending);
    store.insert(a.clone(), &[]).await.unwrap();
    let b = sample_task("f0000002", TaskStatus::Blocked);
    let edges = vec![Dependency { task_id: b.id.clone(), depends_on: a.id.clone() }];
    store.insert(b, &edges).await.unwrap();

    let err = store.delete(&a.id).await.unwrap_err();
    assert!(matches!(err, TaskError::DependencyViolation(_)));
}

#[tokio::test]
async fn notifications_are_delivered_exactly_once() {
    let store = create_test_store().await;
    store.emit(Some("agent-a"), None, NotificationKind::Unblocked, "task unblocked").await.unwrap();
    store.emit(None, None, NotificationKind::Discovery, "broadcast discovery").await.unwrap();

    let first = store.watch("agent-a", None).await.unwrap();
    assert_eq!(first.len(), 2);

    let second = store.watch("agent-a", None).await.unwrap();
    assert!(second.is_empty());

    let other_agent = store.watch("agent-b", None).await.unwrap();
    assert!(other_agent.is_empty());
}

#[tokio::test]
async fn metrics_reflect_completed_tasks() {
    let store = create_test_store().await;
    let mut task = sample_task("g0000001", TaskStatus::Pending);
    task.estimated_hours = Some(10.0);
    store.insert(task.clone(), &[]).await.unwrap();
    store
        .complete(&task.id, &CompleteOptions { actual_hours: Some(12.0), ..Default::default() })
        .await
        .unwrap();

    let time = store.time_summary(None).await.unwrap();
    assert_eq!(time.total_estimated_hours, 10.0);
    assert_eq!(time.total_actual_hours, 12.0);
    assert!(time.average_estimation_accuracy.unwrap() > 0.0);

    let adoption = store.adoption_summary(None).await.unwrap();
    assert_eq!(adoption.completed_count, 1);
}

#[tokio::test]
async fn migrator_reaches_expected_version_and_is_idempotent() {
    let store = create_test_store().await;
    let version = task_core::repository::SchemaRepository::current_version(&store).await.unwrap();
    assert_eq!(version, 1);

    let backups = PathBuf::from(std::env::temp_dir().join("task-orchestrator-migrate-twice"));
    store.migrate(backups).await.unwrap();
    let version_again = task_core::repository::SchemaRepository::current_version(&store).await.unwrap();
    assert_eq!(version_again, 1);
}

#[tokio::test]
async fn concurrent_inserts_do_not_collide_on_generated_ids() {
    let store = create_test_store().await;
    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let id = store.next_task_id().await.unwrap();
            let task = sample_task(id.as_str(), TaskStatus::Pending);
            store.insert(task, &[]).await.unwrap();
            i
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let all = store.list(TaskFilter::default()).await.unwrap();
    assert_eq!(all.len(), 10);
}
