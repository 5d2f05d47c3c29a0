//! Integration tests for full sync runs.
//!
//! The remote API is a `wiremock` server and the store is an in-memory
//! SQLite database, so these run without any external services.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - first run, idempotent re-run, label reconciliation, archive sweep
//! - `verify_*` - deletions detected by re-fetching
//! - `failure_*` - remote errors and a missing snapshot abort the run

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use task_sync_engine::{
    ConfigError, EntityTable, Record, RemoteError, RetryConfig, RowStore, SqliteStore, SyncConfig,
    SyncCoordinator, SyncError, SyncPhase, TodoistClient, TASK_LABELS,
};

// =============================================================================
// Fixtures
// =============================================================================

fn project() -> Value {
    json!({"id": 100, "name": "Inbox", "color": 30, "is_archived": 0, "is_deleted": 0, "inbox_project": true})
}

fn section() -> Value {
    json!({"id": 50, "name": "Errands", "project_id": 100, "section_order": 1})
}

fn task(labels: &[i64]) -> Value {
    json!({
        "id": 7,
        "project_id": 100,
        "section_id": 50,
        "content": "Buy milk",
        "priority": 4,
        "checked": 0,
        "in_history": 0,
        "is_deleted": 0,
        "labels": labels,
        "due": {"date": "2024-01-01", "is_recurring": false, "string": "every mon", "lang": "en"}
    })
}

fn comment() -> Value {
    json!({"id": 70, "item_id": 7, "project_id": 100, "content": "skimmed"})
}

fn snapshot(labels: &[i64]) -> Value {
    json!({
        "labels": [
            {"id": 3, "name": "home", "item_order": 1, "is_deleted": 0, "is_favorite": 0},
            {"id": 9, "name": "shop", "item_order": 2, "is_deleted": 0, "is_favorite": 1},
            {"id": 15, "name": "work", "item_order": 3, "is_deleted": 0, "is_favorite": 0}
        ],
        "projects": [project()],
        "user": {"id": 5, "full_name": "Sam", "karma": 12.5, "tz_info": {"timezone": "UTC"}},
        "sections": [section()],
        "items": [task(labels)],
        "notes": [comment()]
    })
}

async fn mount(server: &MockServer, endpoint: &str, body_has: Option<&str>, response: ResponseTemplate) {
    let builder = Mock::given(method("POST")).and(path(format!("/sync/v8/{endpoint}")));
    let builder = match body_has {
        Some(fragment) => builder.and(body_string_contains(fragment)),
        None => builder,
    };
    builder.respond_with(response).mount(server).await;
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Mount a remote that agrees with the snapshot on every re-fetch.
async fn mount_consistent_remote(server: &MockServer, labels: &[i64]) {
    mount(server, "sync", None, ok(snapshot(labels))).await;
    mount(server, "projects/get", Some("project_id=100"), ok(json!({"project": project()}))).await;
    mount(server, "sections/get", Some("section_id=50"), ok(json!({"section": section()}))).await;
    mount(
        server,
        "items/get",
        Some("item_id=7"),
        ok(json!({"item": task(labels), "notes": [comment()]})),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/sync/v8/archive/items"))
        .respond_with(ok(json!({"items": [], "has_more": false})))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn coordinator(server: &MockServer) -> SyncCoordinator {
    let config = SyncConfig {
        api_endpoint: format!("{}/sync/", server.uri()),
        api_token: "test-token".into(),
        database_url: "sqlite::memory:".into(),
        request_timeout_secs: 5,
        ..SyncConfig::default()
    };
    config.validate().unwrap();
    let store = SqliteStore::connect_with_retry(&config.database_url, &RetryConfig::once())
        .await
        .unwrap();
    let remote = TodoistClient::new(&config).unwrap();
    SyncCoordinator::new(Arc::new(store), Arc::new(remote))
}

async fn seed(coordinator: &SyncCoordinator, table: EntityTable, row: Value) {
    let record = Record::from_value(row).unwrap();
    let outcome = coordinator.engine().upsert(table, &record).await;
    assert!(outcome.is_inserted(), "seeding {table}: {outcome:?}");
}

async fn rows(coordinator: &SyncCoordinator, table: EntityTable) -> Vec<Record> {
    coordinator.engine().store().query(table).await.unwrap()
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn happy_first_run_inserts_everything() {
    let server = MockServer::start().await;
    mount_consistent_remote(&server, &[3, 9]).await;
    let coordinator = coordinator(&server).await;

    let report = coordinator.run().await.unwrap();
    let stats = &report.stats;

    assert_eq!(stats.summary_for("labels").inserted, 3);
    assert_eq!(stats.summary_for("projects").inserted, 1);
    assert_eq!(stats.summary_for("user").inserted, 1);
    assert_eq!(stats.summary_for("user-history").inserted, 1);
    assert_eq!(stats.summary_for("sections").inserted, 1);
    assert_eq!(stats.summary_for("tasks").inserted, 1);
    assert_eq!(stats.summary_for("comments").inserted, 1);
    assert_eq!(stats.summary_for("tasks-labels").inserted, 2);

    // The task row already carries its due columns
    assert!(stats.outcomes("tasks-due")[0].is_unchanged());

    // Re-fetches agree with the snapshot
    for bucket in ["projects-updated", "sections-updated", "tasks-updated"] {
        let outcomes = stats.outcomes(bucket);
        assert_eq!(outcomes.len(), 1, "{bucket}");
        assert!(outcomes[0].is_unchanged(), "{bucket}: {:?}", outcomes[0]);
    }

    assert_eq!(report.totals.tasks, 1);
    assert_eq!(report.totals.archived_tasks, 0);
    assert_eq!(report.totals.api_calls, 5);
    assert_eq!(report.failures(), 0);

    let tasks = rows(&coordinator, EntityTable::Task).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].get("due_date"), Some(&json!("2024-01-01")));
    assert_eq!(tasks[0].get("due_is_recurring"), Some(&json!(0)));
    assert_eq!(tasks[0].get("due_string"), Some(&json!("every mon")));

    let comments = rows(&coordinator, EntityTable::Comment).await;
    assert_eq!(comments[0].get("task_id"), Some(&json!(7)));

    let labels = rows(&coordinator, EntityTable::Label).await;
    assert_eq!(labels[1].get("task_order"), Some(&json!(2)));

    let users = rows(&coordinator, EntityTable::User).await;
    assert_eq!(users[0].get("tz_info_timezone"), Some(&json!("UTC")));

    // One history row per bucket
    let history = rows(&coordinator, EntityTable::ImportHistory).await;
    assert_eq!(history.len(), report.summaries().len());
    assert!(report.history.iter().all(|o| o.is_inserted()));
    assert!(history.iter().all(|h| h.get("batch") == Some(&json!(report.batch))));

    assert_eq!(coordinator.phase(), SyncPhase::Complete);
}

#[tokio::test]
async fn happy_second_run_reports_nothing_changed() {
    let server = MockServer::start().await;
    mount_consistent_remote(&server, &[3, 9]).await;
    let coordinator = coordinator(&server).await;

    coordinator.run().await.unwrap();
    let report = coordinator.run().await.unwrap();
    let stats = &report.stats;

    for bucket in ["labels", "projects", "user", "sections", "tasks", "tasks-due", "comments"] {
        let summary = stats.summary_for(bucket);
        assert_eq!(summary.inserted + summary.updated + summary.failed, 0, "{bucket}: {summary:?}");
        assert!(summary.unchanged > 0, "{bucket}");
    }
    assert!(stats.outcomes("tasks-labels").is_empty());

    // Insert-only history keeps growing
    assert!(stats.outcomes("user-history")[0].is_inserted());
    assert_eq!(rows(&coordinator, EntityTable::UserHistory).await.len(), 2);

    let tasks = rows(&coordinator, EntityTable::Task).await;
    assert_eq!(tasks[0].get("modified"), Some(&Value::Null));
}

#[tokio::test]
async fn happy_changed_task_is_updated_and_stamped() {
    let server = MockServer::start().await;
    mount_consistent_remote(&server, &[3, 9]).await;
    let coordinator = coordinator(&server).await;

    seed(
        &coordinator,
        EntityTable::Task,
        json!({"id": 7, "project_id": 100, "content": "Buy bread", "checked": 0, "in_history": 0, "is_deleted": 0}),
    )
    .await;

    let report = coordinator.run().await.unwrap();
    assert!(report.stats.outcomes("tasks")[0].is_updated());

    let tasks = rows(&coordinator, EntityTable::Task).await;
    assert_eq!(tasks[0].get("content"), Some(&json!("Buy milk")));
    assert!(tasks[0].get("modified").is_some_and(Value::is_string));
}

#[tokio::test]
async fn happy_label_links_follow_the_remote() {
    let server = MockServer::start().await;
    mount_consistent_remote(&server, &[9, 15]).await;
    let coordinator = coordinator(&server).await;

    for label in [3, 9] {
        let link = TASK_LABELS.link(7, label).unwrap();
        assert!(coordinator.engine().insert(EntityTable::TaskLabel, &link).await.is_inserted());
    }

    let report = coordinator.run().await.unwrap();
    let links = report.stats.outcomes("tasks-labels");
    assert_eq!(links.len(), 2);
    assert!(links[0].is_deleted());
    assert!(links[0].message().contains("7:3"));
    assert!(links[1].is_inserted());
    assert!(links[1].message().contains("7:15"));

    let stored = coordinator
        .engine()
        .store()
        .query_where(EntityTable::TaskLabel, "task_id", &json!(7))
        .await
        .unwrap();
    let mut ids: Vec<i64> = stored.iter().filter_map(|r| r.int("label_id")).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![9, 15]);
}

#[tokio::test]
async fn happy_empty_remote_labels_clear_local_links() {
    let server = MockServer::start().await;
    mount_consistent_remote(&server, &[]).await;
    let coordinator = coordinator(&server).await;

    let link = TASK_LABELS.link(7, 3).unwrap();
    coordinator.engine().insert(EntityTable::TaskLabel, &link).await;

    let report = coordinator.run().await.unwrap();
    let links = report.stats.outcomes("tasks-labels");
    assert_eq!(links.len(), 1);
    assert!(links[0].is_deleted());
}

#[tokio::test]
async fn happy_archive_sweep_drains_pages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync/v8/archive/items"))
        .and(query_param("project_id", "100"))
        .and(query_param("cursor", "next-1"))
        .respond_with(ok(json!({
            "items": [{"id": 903, "project_id": 100, "content": "old 3", "checked": 1, "in_history": 1}],
            "has_more": false
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sync/v8/archive/items"))
        .and(query_param("project_id", "100"))
        .respond_with(ok(json!({
            "items": [
                {"id": 901, "project_id": 100, "content": "old 1", "checked": 1, "in_history": 1},
                {"id": 902, "project_id": 100, "content": "old 2", "checked": 1, "in_history": 1}
            ],
            "has_more": true,
            "next_cursor": "next-1"
        })))
        .with_priority(2)
        .mount(&server)
        .await;
    mount_consistent_remote(&server, &[]).await;
    let coordinator = coordinator(&server).await;

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.totals.archived_tasks, 3);
    assert_eq!(report.stats.summary_for("tasks-archived").inserted, 3);

    // Historical tasks are never re-verified
    let second = coordinator.run().await.unwrap();
    assert_eq!(second.stats.summary_for("tasks-archived").unchanged, 3);
    assert_eq!(second.stats.outcomes("tasks-updated").len(), 1);

    assert_eq!(rows(&coordinator, EntityTable::Task).await.len(), 4);
}

// =============================================================================
// Verification
// =============================================================================

#[tokio::test]
async fn verify_missing_task_is_marked_deleted() {
    let server = MockServer::start().await;
    mount(&server, "items/get", Some("item_id=8"), ResponseTemplate::new(404)).await;
    mount_consistent_remote(&server, &[]).await;
    let coordinator = coordinator(&server).await;

    seed(
        &coordinator,
        EntityTable::Task,
        json!({"id": 8, "project_id": 100, "content": "Gone", "checked": 0, "in_history": 0, "is_deleted": 0}),
    )
    .await;

    let report = coordinator.run().await.unwrap();
    let updated = report.stats.outcomes("tasks-updated");
    assert!(updated.iter().any(|o| o.is_updated() && o.message().contains("task_deleted row 8")));

    let tasks = rows(&coordinator, EntityTable::Task).await;
    let gone = tasks.iter().find(|t| t.int("id") == Some(8)).unwrap();
    assert!(gone.flag("is_deleted"));
    assert_eq!(gone.get("content"), Some(&json!("Gone")));
}

#[tokio::test]
async fn verify_remote_deleted_flag_uses_deletion_upsert() {
    let server = MockServer::start().await;
    let mut deleted = task(&[]);
    deleted["id"] = json!(8);
    deleted["is_deleted"] = json!(1);
    mount(&server, "items/get", Some("item_id=8"), ok(json!({"item": deleted, "notes": []}))).await;
    mount_consistent_remote(&server, &[]).await;
    let coordinator = coordinator(&server).await;

    seed(&coordinator, EntityTable::Task, json!({"id": 8, "project_id": 100, "content": "Old", "is_deleted": 0}))
        .await;

    coordinator.run().await.unwrap();
    let tasks = rows(&coordinator, EntityTable::Task).await;
    let row = tasks.iter().find(|t| t.int("id") == Some(8)).unwrap();
    assert!(row.flag("is_deleted"));
    // Deletion-flavoured write leaves content alone
    assert_eq!(row.get("content"), Some(&json!("Old")));
}

#[tokio::test]
async fn verify_missing_project_is_deleted_and_its_tasks_skipped() {
    let server = MockServer::start().await;
    mount(&server, "projects/get", Some("project_id=200"), ResponseTemplate::new(404)).await;
    Mock::given(method("POST"))
        .and(path("/sync/v8/items/get"))
        .and(body_string_contains("item_id=9"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;
    mount_consistent_remote(&server, &[]).await;
    let coordinator = coordinator(&server).await;

    seed(&coordinator, EntityTable::Project, json!({"id": 200, "name": "Old", "is_archived": 0, "is_deleted": 0}))
        .await;
    seed(&coordinator, EntityTable::Task, json!({"id": 9, "project_id": 200, "content": "x", "is_deleted": 0}))
        .await;

    let report = coordinator.run().await.unwrap();
    assert!(report
        .stats
        .outcomes("projects-updated")
        .iter()
        .any(|o| o.is_updated() && o.message().contains("project row 200")));

    let projects = rows(&coordinator, EntityTable::Project).await;
    let old = projects.iter().find(|p| p.int("id") == Some(200)).unwrap();
    assert!(old.flag("is_deleted"));
}

#[tokio::test]
async fn verify_missing_section_is_marked_deleted() {
    let server = MockServer::start().await;
    mount(&server, "sections/get", Some("section_id=60"), ok(json!({}))).await;
    mount_consistent_remote(&server, &[]).await;
    let coordinator = coordinator(&server).await;

    seed(&coordinator, EntityTable::Section, json!({"id": 60, "name": "Later", "project_id": 100, "is_deleted": 0}))
        .await;

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.stats.summary_for("sections-updated").updated, 1);

    let sections = rows(&coordinator, EntityTable::Section).await;
    let later = sections.iter().find(|s| s.int("id") == Some(60)).unwrap();
    assert!(later.flag("is_deleted"));
}

#[tokio::test]
async fn verify_comments_missing_remotely_are_retired() {
    let server = MockServer::start().await;
    mount_consistent_remote(&server, &[]).await;
    let coordinator = coordinator(&server).await;

    seed(
        &coordinator,
        EntityTable::Comment,
        json!({"id": 71, "item_id": 7, "project_id": 100, "content": "stale", "is_deleted": 0}),
    )
    .await;

    let report = coordinator.run().await.unwrap();
    let retired = report.stats.outcomes("comments-updated");
    assert_eq!(retired.len(), 1);
    assert!(retired[0].is_updated());

    let comments = rows(&coordinator, EntityTable::Comment).await;
    let stale = comments.iter().find(|c| c.int("id") == Some(71)).unwrap();
    assert!(stale.flag("is_deleted"));
    assert_eq!(stale.get("task_id"), Some(&json!(7)));
    let live = comments.iter().find(|c| c.int("id") == Some(70)).unwrap();
    assert!(!live.flag("is_deleted"));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn failure_snapshot_error_aborts_run() {
    let server = MockServer::start().await;
    mount(&server, "sync", None, ResponseTemplate::new(500).set_body_json(json!({"error": "down"}))).await;
    let coordinator = coordinator(&server).await;
    let mut phases = coordinator.phase_receiver();

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Remote(RemoteError::Status { status: 500, .. })
    ));
    assert_eq!(coordinator.phase(), SyncPhase::Failed);
    assert_eq!(*phases.borrow_and_update(), SyncPhase::Failed);

    assert!(rows(&coordinator, EntityTable::ImportHistory).await.is_empty());
}

#[tokio::test]
async fn failure_snapshot_not_found_aborts_run() {
    let server = MockServer::start().await;
    // every endpoint, including the full pull, answers 404
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let coordinator = coordinator(&server).await;
    seed(&coordinator, EntityTable::Project, project()).await;
    seed(&coordinator, EntityTable::Task, json!({"id": 7, "project_id": 100, "content": "Pay rent"})).await;
    let projects_before = rows(&coordinator, EntityTable::Project).await;
    let tasks_before = rows(&coordinator, EntityTable::Task).await;

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(RemoteError::SnapshotUnavailable(_))));
    assert_eq!(coordinator.phase(), SyncPhase::Failed);

    assert_eq!(rows(&coordinator, EntityTable::Project).await, projects_before);
    assert_eq!(rows(&coordinator, EntityTable::Task).await, tasks_before);
    assert!(!rows(&coordinator, EntityTable::Project).await[0].flag("is_deleted"));
    assert!(rows(&coordinator, EntityTable::ImportHistory).await.is_empty());
}

#[tokio::test]
async fn failure_invalid_config_is_rejected_before_connecting() {
    let config = SyncConfig {
        api_endpoint: "https://api.todoist.com/sync/".into(),
        api_token: String::new(),
        database_url: "sqlite::memory:".into(),
        ..SyncConfig::default()
    };

    let err = SyncCoordinator::from_config(&config).await.err().unwrap();
    assert!(matches!(err, SyncError::Config(ConfigError::Missing(_))), "{err:?}");
}

#[tokio::test]
async fn failure_rejected_token_during_verify_aborts_run() {
    let server = MockServer::start().await;
    mount(&server, "projects/get", None, ResponseTemplate::new(401).set_body_string("invalid token"))
        .await;
    mount(&server, "sync", None, ok(snapshot(&[]))).await;
    let coordinator = coordinator(&server).await;

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(RemoteError::Auth(_))));

    // Inbound writes already landed; no history for an aborted run
    assert_eq!(rows(&coordinator, EntityTable::Task).await.len(), 1);
    assert!(rows(&coordinator, EntityTable::ImportHistory).await.is_empty());
}
