//! HTTP API tests driving the full router against in-memory adapters.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use todo_service::api::{create_router, AppState};
use todo_service::config::HttpConfig;
use todo_service::queue::MemoryQueue;
use todo_service::render::PageShell;
use todo_service::store::{MemoryStore, RecordStore, StoreError, TodoRecord};
use todo_service::worker::QueueWorker;
use tower::ServiceExt;

const TEST_TEMPLATE: &str =
    "<div id=\"app\">{{thing}}</div><script>window.__PROPS__ = {{props}}</script>";

struct TestApp {
    store: MemoryStore,
    queue: MemoryQueue,
    router: Router,
}

fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let queue = MemoryQueue::new();

    let state = AppState {
        store: Arc::new(store.clone()),
        queue: Arc::new(queue.clone()),
        shell: Arc::new(PageShell::from_template(TEST_TEMPLATE)),
    };

    let router = create_router(state, &HttpConfig::default());

    TestApp {
        store,
        queue,
        router,
    }
}

async fn request(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<&Value>,
) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);

    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, bytes.to_vec())
}

async fn request_json(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<&Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = request(router, method, uri, body).await;
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

fn record(id: &str, title: &str, completed: bool) -> TodoRecord {
    TodoRecord {
        id: id.to_string(),
        title: title.to_string(),
        completed,
    }
}

#[tokio::test]
async fn create_then_get_returns_exact_record() {
    let app = test_app();

    let body = json!({ "id": "a1", "title": "Buy milk", "completed": false });
    let (status, created) = request_json(&app.router, "POST", "/api/todo", Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created, body);

    let (status, fetched) = request_json(&app.router, "GET", "/api/todo/a1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, body);
}

#[tokio::test]
async fn create_coerces_completed_by_truthiness() {
    let app = test_app();

    let body = json!({ "id": "a1", "title": "Buy milk", "completed": "yes" });
    let (status, created) = request_json(&app.router, "POST", "/api/todo", Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["completed"], json!(true));

    // Absent completed defaults to false
    let body = json!({ "id": "a2", "title": "Walk" });
    let (_, created) = request_json(&app.router, "POST", "/api/todo", Some(&body)).await;
    assert_eq!(created["completed"], json!(false));
}

#[tokio::test]
async fn create_overwrites_existing_id() {
    let app = test_app();

    let first = json!({ "id": "a1", "title": "Buy milk" });
    request_json(&app.router, "POST", "/api/todo", Some(&first)).await;

    let second = json!({ "id": "a1", "title": "Buy bread", "completed": true });
    let (status, _) = request_json(&app.router, "POST", "/api/todo", Some(&second)).await;
    assert_eq!(status, StatusCode::OK);

    let stored = app.store.get("a1").await.unwrap().unwrap();
    assert_eq!(stored, record("a1", "Buy bread", true));
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn create_missing_id_is_rejected_naming_the_field() {
    let app = test_app();

    let body = json!({ "title": "Buy milk" });
    let (status, error) = request_json(&app.router, "POST", "/api/todo", Some(&body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = error["error"].as_str().unwrap();
    assert!(message.starts_with("id must be a string:"));
    assert!(message.contains("Buy milk"));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn create_non_string_title_is_rejected() {
    let app = test_app();

    let body = json!({ "id": "a1", "title": ["not", "a", "string"] });
    let (status, error) = request_json(&app.router, "POST", "/api/todo", Some(&body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"]
        .as_str()
        .unwrap()
        .starts_with("title must be a string:"));
}

#[tokio::test]
async fn marked_title_sends_notification_instead_of_storing() {
    let app = test_app();

    let body = json!({ "id": "x", "title": "!hello", "completed": true });
    let (status, response) = request_json(&app.router, "POST", "/api/todo", Some(&body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "ok": "ok" }));

    assert_eq!(app.queue.sent().await, vec!["hello".to_string()]);
    assert_eq!(app.store.get("x").await.unwrap(), None);
}

#[tokio::test]
async fn get_missing_record_is_404() {
    let app = test_app();

    let (status, error) = request_json(&app.router, "GET", "/api/todo/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], json!("Record not found id = nope"));
}

#[tokio::test]
async fn delete_nonexistent_id_succeeds() {
    let app = test_app();

    let (status, response) = request_json(&app.router, "DELETE", "/api/todo/ghost", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "deleted": "ghost" }));
}

#[tokio::test]
async fn list_is_empty_array_after_deleting_everything() {
    let app = test_app();

    for id in ["a", "b"] {
        let body = json!({ "id": id, "title": "item" });
        request_json(&app.router, "POST", "/api/todo", Some(&body)).await;
    }
    for id in ["a", "b"] {
        request_json(&app.router, "DELETE", &format!("/api/todo/{id}"), None).await;
    }

    let (status, listed) = request_json(&app.router, "GET", "/api/todo", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn list_returns_all_records() {
    let app = test_app();

    for (id, title) in [("a", "one"), ("b", "two"), ("c", "three")] {
        let body = json!({ "id": id, "title": title });
        request_json(&app.router, "POST", "/api/todo", Some(&body)).await;
    }

    let (status, listed) = request_json(&app.router, "GET", "/api/todo", None).await;
    assert_eq!(status, StatusCode::OK);

    let mut items = listed.as_array().unwrap().clone();
    items.sort_by_key(|v| v["id"].as_str().unwrap().to_string());
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], json!({ "id": "a", "title": "one", "completed": false }));
}

#[tokio::test]
async fn update_replaces_record() {
    let app = test_app();

    let body = json!({ "id": "a1", "title": "Buy milk" });
    request_json(&app.router, "POST", "/api/todo", Some(&body)).await;

    let update = json!({ "id": "a1", "title": "Buy oat milk", "completed": 1 });
    let (status, updated) = request_json(&app.router, "POST", "/api/todo/a1", Some(&update)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        updated,
        json!({ "id": "a1", "title": "Buy oat milk", "completed": true })
    );
    assert_eq!(
        app.store.get("a1").await.unwrap().unwrap(),
        record("a1", "Buy oat milk", true)
    );
}

#[tokio::test]
async fn update_with_mismatched_id_is_rejected_without_writing() {
    let app = test_app();

    let body = json!({ "id": "a1", "title": "Buy milk" });
    request_json(&app.router, "POST", "/api/todo", Some(&body)).await;

    let update = json!({ "id": "b2", "title": "Hijack", "completed": true });
    let (status, error) = request_json(&app.router, "POST", "/api/todo/a1", Some(&update)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], json!("id in body must match id in url"));

    // Neither key was touched
    assert_eq!(app.store.get("b2").await.unwrap(), None);
    assert_eq!(
        app.store.get("a1").await.unwrap().unwrap(),
        record("a1", "Buy milk", false)
    );
}

#[tokio::test]
async fn init_loads_exactly_the_seed_set() {
    let app = test_app();

    let stray = json!({ "id": "stray", "title": "Old" });
    request_json(&app.router, "POST", "/api/todo", Some(&stray)).await;

    let (status, response) = request_json(&app.router, "POST", "/api/init", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "count": 6 }));

    let (_, listed) = request_json(&app.router, "GET", "/api/todo", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 6);
    assert_eq!(app.store.get("stray").await.unwrap(), None);
}

#[tokio::test]
async fn unmatched_api_paths_are_404() {
    let app = test_app();

    let (status, error) = request_json(&app.router, "POST", "/api/frobnicate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], json!("Not found"));

    let (status, _) = request_json(&app.router, "GET", "/api/nope/deeper", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Wrong method on a known path falls through to the API catchall
    let (status, _) = request_json(&app.router, "PUT", "/api/todo/a1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn queue_read_returns_visible_messages() {
    let app = test_app();

    app.queue.push("first").await;
    app.queue.push("second").await;

    let (status, response) = request_json(&app.router, "GET", "/api/queue", None).await;
    assert_eq!(status, StatusCode::OK);

    let messages = response["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["body"], json!("first"));
    assert_eq!(messages[1]["body"], json!("second"));
}

#[tokio::test]
async fn non_api_get_serves_page_shell() {
    let app = test_app();

    let (status, bytes) = request(&app.router, "GET", "/todos/a1", None).await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(bytes).unwrap();
    assert!(html.contains("window.__PROPS__"));
    assert!(html.contains("/todos/a1"));
    assert!(!html.contains("{{thing}}"));
}

#[tokio::test]
async fn marked_reset_title_drives_the_worker() {
    let app = test_app();

    let body = json!({ "id": "ignored", "title": "!reset" });
    let (status, response) = request_json(&app.router, "POST", "/api/todo", Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "ok": "ok" }));

    let worker = QueueWorker::new(Arc::new(app.queue.clone()), Arc::new(app.store.clone()));
    let handled = worker.poll_once().await.unwrap();

    assert_eq!(handled, 1);
    assert_eq!(app.store.len().await, 6);
}

/// Store double whose every call fails, for the 500 paths
#[derive(Clone)]
struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn get(&self, _id: &str) -> Result<Option<TodoRecord>, StoreError> {
        Err(StoreError::Upstream("simulated outage".to_string()))
    }

    async fn put(&self, _record: &TodoRecord) -> Result<(), StoreError> {
        Err(StoreError::Upstream("simulated outage".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Upstream("simulated outage".to_string()))
    }

    async fn scan(&self) -> Result<Vec<TodoRecord>, StoreError> {
        Err(StoreError::Upstream("simulated outage".to_string()))
    }
}

fn failing_app() -> Router {
    let state = AppState {
        store: Arc::new(FailingStore),
        queue: Arc::new(MemoryQueue::new()),
        shell: Arc::new(PageShell::from_template(TEST_TEMPLATE)),
    };

    create_router(state, &HttpConfig::default())
}

#[tokio::test]
async fn store_failures_surface_as_500_without_leaking_internals() {
    let router = failing_app();

    let (status, error) = request_json(&router, "GET", "/api/todo/a1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["error"], json!("Failed to get record id = a1"));

    let (status, _) = request_json(&router, "GET", "/api/todo", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = request_json(&router, "DELETE", "/api/todo/a1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let body = json!({ "id": "a1", "title": "Buy milk" });
    let (status, _) = request_json(&router, "POST", "/api/todo", Some(&body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, error) = request_json(&router, "POST", "/api/init", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["error"], json!("Failed to get records"));
}

#[tokio::test]
async fn validation_still_runs_before_store_on_failing_backend() {
    let router = failing_app();

    let body = json!({ "title": "no id" });
    let (status, error) = request_json(&router, "POST", "/api/todo", Some(&body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"].as_str().unwrap().starts_with("id must be a string:"));
}
