use crate::config::HttpConfig;
use crate::queue::EventQueue;
use crate::render::PageShell;
use crate::reset;
use crate::store::{RecordStore, TodoRecord};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument};

/// Leading title character that redirects a create to the queue
pub const NOTIFY_MARKER: char = '!';

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub queue: Arc<dyn EventQueue>,
    pub shell: Arc<PageShell>,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Acknowledgement returned by a delete
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

/// Count of seed records loaded by a reset
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub count: usize,
}

/// Messages currently visible on the queue
#[derive(Debug, Serialize)]
pub struct QueueReadResponse {
    pub messages: Vec<QueueMessageView>,
}

/// A queue message as surfaced over HTTP
#[derive(Debug, Serialize)]
pub struct QueueMessageView {
    pub message_id: Option<String>,
    pub body: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message }),
    )
}

fn not_found(message: String) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: message }))
}

fn internal_error(message: String) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
}

/// Create the API router
pub fn create_router(state: AppState, config: &HttpConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    let static_root = PathBuf::from(&config.static_dir);

    // Non-API GETs: try a static file from the bundle root first, then
    // fall back to the rendered page shell
    let shell = get(render_page)
        .fallback(api_not_found)
        .with_state(state.clone());
    let static_files = ServeDir::new(&static_root)
        .append_index_html_on_directories(false)
        .not_found_service(shell);

    // Everything under /api falls through to a JSON 404, including known
    // paths hit with the wrong method
    let api = Router::new()
        .route(
            "/todo",
            get(list_todos).post(create_todo).fallback(api_not_found),
        )
        .route(
            "/todo/:id",
            get(get_todo)
                .delete(delete_todo)
                .post(update_todo)
                .fallback(api_not_found),
        )
        .route("/init", post(init_todos).fallback(api_not_found))
        .route("/queue", get(read_queue).fallback(api_not_found))
        .fallback(api_not_found);

    Router::new()
        .nest("/api", api)
        .nest_service("/assets", ServeDir::new(static_root.join("assets")))
        .nest_service("/css", ServeDir::new(static_root.join("css")))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Obtain a record
#[instrument(skip(state))]
async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TodoRecord>, ApiError> {
    debug!(id = %id, "Getting record");

    let record = state.store.get(&id).await.map_err(|e| {
        error!(error = %e, id = %id, "Failed to get record");
        internal_error(format!("Failed to get record id = {id}"))
    })?;

    match record {
        Some(record) => Ok(Json(record)),
        None => Err(not_found(format!("Record not found id = {id}"))),
    }
}

/// Delete a record; deleting a nonexistent id succeeds
#[instrument(skip(state))]
async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    debug!(id = %id, "Deleting record");

    state.store.delete(&id).await.map_err(|e| {
        error!(error = %e, id = %id, "Failed to delete record");
        internal_error(format!("Failed to delete record id = {id}"))
    })?;

    Ok(Json(DeleteResponse { deleted: id }))
}

/// List all records
#[instrument(skip(state))]
async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<TodoRecord>>, ApiError> {
    let records = state.store.scan().await.map_err(|e| {
        error!(error = %e, "Failed to list records");
        internal_error("Failed to list records".to_string())
    })?;

    Ok(Json(records))
}

/// Add a new record, or send a queue notification when the title carries
/// the reserved marker
#[instrument(skip(state, body))]
async fn create_todo(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    info!(body = %body, "Adding new todo");

    let record = parse_record(&body)?;

    if let Some(message) = record.title.strip_prefix(NOTIFY_MARKER) {
        // Fire-and-forget: the ack does not depend on delivery
        state.queue.send(message).await;
        return Ok(Json(json!({ "ok": "ok" })).into_response());
    }

    state.store.put(&record).await.map_err(|e| {
        error!(error = %e, id = %record.id, "Failed to add record");
        internal_error(format!("Failed to add record id = {}", record.id))
    })?;

    Ok(Json(record).into_response())
}

/// Replace an existing record
#[instrument(skip(state, body))]
async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<TodoRecord>, ApiError> {
    let record = parse_record(&body)?;

    if record.id != id {
        return Err(bad_request(
            "id in body must match id in url".to_string(),
        ));
    }

    state.store.put(&record).await.map_err(|e| {
        error!(error = %e, id = %id, "Failed to update record");
        internal_error(format!("Failed to update record id = {id}"))
    })?;

    Ok(Json(record))
}

/// Clear the store and reload the seed set
#[instrument(skip(state))]
async fn init_todos(State(state): State<AppState>) -> Result<Json<ResetResponse>, ApiError> {
    let report = reset::run(state.store.as_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to reset records");
        internal_error("Failed to get records".to_string())
    })?;

    Ok(Json(ResetResponse {
        count: report.inserted,
    }))
}

/// Read whatever messages are currently visible on the queue
#[instrument(skip(state))]
async fn read_queue(State(state): State<AppState>) -> Result<Json<QueueReadResponse>, ApiError> {
    let messages = state.queue.receive().await.map_err(|e| {
        error!(error = %e, "Failed to read queue");
        internal_error("Failed to read queue".to_string())
    })?;

    Ok(Json(QueueReadResponse {
        messages: messages
            .into_iter()
            .map(|m| QueueMessageView {
                message_id: m.message_id,
                body: m.body,
            })
            .collect(),
    }))
}

/// Catchall for unmatched API methods and paths
async fn api_not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
        }),
    )
}

/// Serve the page shell for non-API GETs
async fn render_page(State(state): State<AppState>, uri: Uri) -> Html<String> {
    Html(state.shell.render(uri.path()))
}

/// Validate the submitted body and coerce it into a record.
///
/// `id` and `title` must be JSON strings; `completed` is coerced by
/// truthiness. Violations name the offending field and echo the body.
fn parse_record(body: &Value) -> Result<TodoRecord, ApiError> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request(format!("id must be a string: {body}")))?;

    let title = body
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request(format!("title must be a string: {body}")))?;

    Ok(TodoRecord {
        id: id.to_string(),
        title: title.to_string(),
        completed: truthy(body.get("completed")),
    })
}

/// JS-style truthiness for the `completed` field
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Start the HTTP server
pub async fn start_api_server(state: AppState, config: &HttpConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    Ok(())
}
