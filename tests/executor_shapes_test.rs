// Projection, relation expansion, aggregates, and the single-record
// operation contracts, exercised through the dispatch path.

use dyncrud::{
    AggregateSpec, CrudError, Filter, ModelDescriptor, ModelRegistry, OperationKind,
    OperationOutcome, OperationRequest, OperationRouter,
};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{MemoryProvider, registry_with, registry_with_relations, seeded_tasks};

fn expect_record(outcome: OperationOutcome) -> serde_json::Value {
    match outcome {
        OperationOutcome::Record(record) => record,
        other => panic!("expected a record, got {other:?}"),
    }
}

fn expect_records(outcome: OperationOutcome) -> Vec<serde_json::Value> {
    match outcome {
        OperationOutcome::Records(records) => records,
        other => panic!("expected records, got {other:?}"),
    }
}

#[tokio::test]
async fn test_select_defaults_to_descriptor_fields() {
    let provider = Arc::new(MemoryProvider::seeded(vec![json!({
        "id": "task-1",
        "title": "Task 1",
        "priority": 1,
        "completed": false,
        "internal_notes": "should not leak"
    })]));
    let router = OperationRouter::new(registry_with(provider));

    let request = OperationRequest::new("Task", OperationKind::FindMany);
    let records = expect_records(router.dispatch(&request).await.unwrap());

    assert_eq!(
        records[0],
        json!({"id": "task-1", "title": "Task 1", "priority": 1, "completed": false})
    );
}

#[tokio::test]
async fn test_explicit_select_narrows_projection() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(1)));
    let router = OperationRouter::new(registry_with(provider));

    let mut request = OperationRequest::new("Task", OperationKind::FindMany);
    request.select = Some(vec!["id".to_string(), "title".to_string()]);
    let records = expect_records(router.dispatch(&request).await.unwrap());

    assert_eq!(records[0], json!({"id": "task-1", "title": "Task 1"}));
}

#[tokio::test]
async fn test_find_unique_requires_a_unique_equality_filter() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(3)));
    let router = OperationRouter::new(registry_with(provider));

    // priority is not declared unique
    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"priority": 2})).unwrap();
    let err = router.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, CrudError::Validation { .. }));

    // range filters cannot identify a unique record either
    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"id": {"gte": "task-1"}})).unwrap();
    assert!(router.dispatch(&request).await.is_err());

    // id works
    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"id": "task-2"})).unwrap();
    let record = expect_record(router.dispatch(&request).await.unwrap());
    assert_eq!(record["title"], "Task 2");

    // declared-unique fields work too
    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"title": "Task 3"})).unwrap();
    assert!(router.dispatch(&request).await.is_ok());
}

#[tokio::test]
async fn test_find_unique_miss_is_record_not_found() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(1)));
    let router = OperationRouter::new(registry_with(provider));

    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"id": "missing"})).unwrap();
    let err = router.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, CrudError::RecordNotFound { .. }));
}

#[tokio::test]
async fn test_include_expands_relations() {
    let projects = Arc::new(MemoryProvider::seeded(vec![
        json!({"id": "p1", "name": "Platform"}),
        json!({"id": "p2", "name": "Mobile"}),
    ]));
    let tasks = Arc::new(MemoryProvider::seeded(vec![
        json!({"id": "t1", "title": "A", "priority": 1, "completed": false, "project_id": "p1"}),
        json!({"id": "t2", "title": "B", "priority": 2, "completed": false, "project_id": "p1"}),
        json!({"id": "t3", "title": "C", "priority": 3, "completed": true, "project_id": "p2"}),
    ]));
    let router = OperationRouter::new(registry_with_relations(projects, tasks));

    // to-one expansion on Task
    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"id": "t1"})).unwrap();
    request.include = Some(vec!["project".to_string()]);
    let record = expect_record(router.dispatch(&request).await.unwrap());
    assert_eq!(record["project"], json!({"id": "p1", "name": "Platform"}));

    // to-many expansion on Project
    let mut request = OperationRequest::new("Project", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"id": "p1"})).unwrap();
    request.include = Some(vec!["tasks".to_string()]);
    let record = expect_record(router.dispatch(&request).await.unwrap());
    let related = record["tasks"].as_array().unwrap();
    assert_eq!(related.len(), 2);
}

#[tokio::test]
async fn test_include_wins_over_select_for_relation_names() {
    let projects = Arc::new(MemoryProvider::seeded(vec![
        json!({"id": "p1", "name": "Platform"}),
    ]));
    let tasks = Arc::new(MemoryProvider::seeded(vec![
        json!({"id": "t1", "title": "A", "priority": 1, "completed": false, "project_id": "p1"}),
    ]));
    let router = OperationRouter::new(registry_with_relations(projects, tasks));

    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"id": "t1"})).unwrap();
    // select names the relation as if it were a scalar; include expands it
    request.select = Some(vec!["id".to_string(), "project".to_string()]);
    request.include = Some(vec!["project".to_string()]);
    let record = expect_record(router.dispatch(&request).await.unwrap());

    assert_eq!(record["id"], "t1");
    assert_eq!(record["project"]["name"], "Platform");
}

#[tokio::test]
async fn test_unknown_include_name_is_a_validation_error() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(1)));
    let router = OperationRouter::new(registry_with(provider));

    let mut request = OperationRequest::new("Task", OperationKind::FindMany);
    request.include = Some(vec!["ghosts".to_string()]);
    let err = router.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, CrudError::Validation { .. }));
}

#[tokio::test]
async fn test_aggregate_returns_only_requested_keys() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(4)));
    let router = OperationRouter::new(registry_with(provider));

    let mut request = OperationRequest::new("Task", OperationKind::Aggregate);
    request.aggregate = Some(AggregateSpec {
        count: true,
        sum: vec!["priority".to_string()],
        avg: vec![],
        min: vec![],
        max: vec!["priority".to_string()],
    });
    let outcome = router.dispatch(&request).await.unwrap();
    let OperationOutcome::Aggregate(value) = outcome else {
        panic!("expected an aggregate outcome");
    };

    assert_eq!(value["_count"], 4);
    assert_eq!(value["_sum"]["priority"], 10.0);
    assert_eq!(value["_max"]["priority"], 4.0);
    assert!(value.get("_avg").is_none());
    assert!(value.get("_min").is_none());
}

#[tokio::test]
async fn test_aggregate_without_spec_is_rejected() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(1)));
    let router = OperationRouter::new(registry_with(provider));

    let request = OperationRequest::new("Task", OperationKind::Aggregate);
    let err = router.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, CrudError::Validation { .. }));
}

#[tokio::test]
async fn test_count_ignores_pagination_arguments() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(7)));
    let router = OperationRouter::new(registry_with(provider));

    let mut request = OperationRequest::new("Task", OperationKind::Count);
    request.filter = Filter::from_json(&json!({"completed": false})).unwrap();
    let outcome = router.dispatch(&request).await.unwrap();
    let OperationOutcome::Count(total) = outcome else {
        panic!("expected a count outcome");
    };
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_update_and_delete_require_a_targeted_filter() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(2)));
    let router = OperationRouter::new(registry_with(provider));

    let mut request = OperationRequest::new("Task", OperationKind::Update);
    request.data = Some(json!({"completed": true}));
    let err = router.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, CrudError::Validation { .. }));

    let request = OperationRequest::new("Task", OperationKind::Delete);
    let err = router.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, CrudError::Validation { .. }));
}

#[tokio::test]
async fn test_audit_timestamps_survive_projection_and_parse_as_dates() {
    let provider = Arc::new(MemoryProvider::seeded(vec![json!({
        "id": "t1",
        "title": "Stamped",
        "priority": 1,
        "completed": false,
        "created_at": "2026-08-07T09:30:00Z"
    })]));
    let registry = Arc::new(
        ModelRegistry::builder()
            .register(
                ModelDescriptor::new("Task", "tasks")
                    .with_default_fields(["id", "title", "created_at"]),
                provider,
            )
            .build(),
    );
    let router = OperationRouter::new(registry);

    let mut request = OperationRequest::new("Task", OperationKind::FindUnique);
    request.filter = Filter::from_json(&json!({"id": "t1"})).unwrap();
    let record = expect_record(router.dispatch(&request).await.unwrap());

    let stamp = record["created_at"].as_str().expect("created_at present");
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
}

#[tokio::test]
async fn test_upsert_reports_which_branch_ran() {
    let provider = Arc::new(MemoryProvider::seeded(seeded_tasks(1)));
    let router = OperationRouter::new(registry_with(provider));

    // No match: create branch
    let mut request = OperationRequest::new("Task", OperationKind::Upsert);
    request.filter = Filter::from_json(&json!({"title": "Fresh"})).unwrap();
    request.create = Some(json!({"title": "Fresh", "priority": 5, "completed": false}));
    request.update = Some(json!({"priority": 6}));
    let outcome = router.dispatch(&request).await.unwrap();
    let OperationOutcome::Upsert(result) = outcome else {
        panic!("expected an upsert outcome");
    };
    assert!(result.created);
    assert_eq!(result.record["priority"], 5);

    // Match: update branch
    let outcome = router.dispatch(&request).await.unwrap();
    let OperationOutcome::Upsert(result) = outcome else {
        panic!("expected an upsert outcome");
    };
    assert!(!result.created);
    assert_eq!(result.record["priority"], 6);
}
