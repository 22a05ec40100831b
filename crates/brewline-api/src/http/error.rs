//! Application error type mapping to HTTP status codes and envelope format.

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use brewline_core::engine::EngineError;

use crate::http::response::{ApiErrorDetail, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Engine(EngineError),
    /// Request body could not be decoded.
    Payload(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Payload(e.body_text())
    }
}

/// HTTP status for an engine error code.
pub fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::AlreadyStarted(_) | EngineError::InstanceClosed(_) => StatusCode::CONFLICT,
        EngineError::NotFound(_) | EngineError::NoWorker { .. } => StatusCode::NOT_FOUND,
        EngineError::UnknownWorkflowType(_)
        | EngineError::UnknownSignal(_)
        | EngineError::UnknownQuery(_)
        | EngineError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        EngineError::Transport(_) | EngineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::Engine(e) => (
                status_for(e),
                ApiErrorDetail {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    detail: Some(e.detail().to_string()),
                },
            ),
            AppError::Payload(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorDetail {
                    code: "INVALID_PAYLOAD".to_string(),
                    message: format!("invalid payload: {msg}"),
                    detail: Some(msg.clone()),
                },
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = %detail.code, message = %detail.message, "request failed");
        } else {
            tracing::debug!(code = %detail.code, message = %detail.message, "request rejected");
        }

        ApiResponse::error(status, detail, Instant::now()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&EngineError::AlreadyStarted("order-1".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&EngineError::NoWorker {
                task_queue: "coffee-orders".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&EngineError::NotFound("order-9".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&EngineError::InvalidPayload("missing drink".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&EngineError::UnknownQuery("get_price".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_payload_error_is_bad_request() {
        let resp = AppError::Payload("expected value".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
