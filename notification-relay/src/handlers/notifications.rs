use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::models::{ErrorResponse, HistoryResponse};
use crate::services::{record_history_read, RelayError};
use crate::startup::AppState;

/// `GET /notifications`: the whole history buffer, newest first.
///
/// The body is encoded up front so an encoding failure becomes a clean 500
/// rather than a truncated 200.
pub async fn list_notifications(State(state): State<AppState>) -> Result<Response, RelayError> {
    let data = state.history.snapshot().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to read notification history");
        record_history_read("error");
        e
    })?;

    let body = serde_json::to_vec(&HistoryResponse::success(data)).map_err(|e| {
        tracing::error!(error = %e, "Failed to encode notification history");
        record_history_read("error");
        RelayError::from(e)
    })?;

    record_history_read("success");

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Any other method on `/notifications`.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET,HEAD")],
        Json(ErrorResponse {
            error: "Method not allowed".to_string(),
        }),
    )
        .into_response()
}
