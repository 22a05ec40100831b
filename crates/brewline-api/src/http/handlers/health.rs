use axum::Json;
use axum::extract::State;

use crate::state::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "task_queue": state.config.task_queue,
        "active_instances": state.engine.active_instances(),
    }))
}
