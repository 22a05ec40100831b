//! Engine primitives over HTTP.
//!
//! Each handler is a thin adapter from the request to the matching
//! `WorkflowEngine` call on the worker's local engine.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use brewline_core::engine::{StartRequest, WorkflowEngine, WorkflowHandle};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Mounted at `/api/v1` by the main router.
pub fn workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/workflows", post(start_workflow))
        .route("/workflows/{key}/signals/{name}", post(signal_workflow))
        .route("/workflows/{key}/queries/{name}", get(query_workflow))
        .route("/workflows/{key}/result", get(workflow_result))
}

fn instance_path(key: &str) -> String {
    format!("/api/v1/workflows/{key}")
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows - Start a new instance.
pub async fn start_workflow(
    State(state): State<AppState>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Result<ApiResponse<WorkflowHandle>, AppError> {
    let start = Instant::now();
    let Json(body) = body?;

    let handle = state.engine.start(body.options, body.input).await?;
    let self_link = instance_path(&handle.instance_key);
    let result_link = format!("{self_link}/result");

    Ok(ApiResponse::success(handle, start)
        .with_status(StatusCode::CREATED)
        .with_link("self", &self_link)
        .with_link("result", &result_link))
}

/// POST /api/v1/workflows/{key}/signals/{name} - Deliver a signal.
///
/// An empty body is a `null` payload.
pub async fn signal_workflow(
    State(state): State<AppState>,
    Path((key, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<ApiResponse<Value>, AppError> {
    let start = Instant::now();
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::Payload(e.to_string()))?
    };

    state.engine.signal(&key, &name, payload).await?;

    Ok(ApiResponse::success(json!({ "accepted": true }), start)
        .with_status(StatusCode::ACCEPTED)
        .with_link("self", &instance_path(&key)))
}

/// GET /api/v1/workflows/{key}/queries/{name} - Read instance state.
pub async fn query_workflow(
    State(state): State<AppState>,
    Path((key, name)): Path<(String, String)>,
) -> Result<ApiResponse<Value>, AppError> {
    let start = Instant::now();
    let payload = state.engine.query(&key, &name).await?;
    Ok(ApiResponse::success(payload, start))
}

/// GET /api/v1/workflows/{key}/result - Long-poll for the terminal payload.
pub async fn workflow_result(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let start = Instant::now();
    let payload = state.engine.result(&key).await?;
    tracing::debug!(instance_key = %key, waited_ms = start.elapsed().as_millis() as u64, "result served");
    Ok(ApiResponse::success(payload, start))
}
