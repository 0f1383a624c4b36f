use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The history store rejected or could not serve a command.
    #[error("Store error: {0}")]
    Store(anyhow::Error),

    /// The bus connection failed while subscribing or receiving.
    #[error("Transport error: {0}")]
    Transport(anyhow::Error),

    /// A message arrived whose payload is not valid text.
    #[error("Undecodable payload: {0}")]
    Payload(String),

    /// The subscription stream ended; the next receive resubscribes.
    #[error("Subscription closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        RelayError::Store(err.into())
    }

    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        RelayError::Transport(err.into())
    }

    /// Message exposed to HTTP clients. Never leaks store internals.
    fn public_message(&self) -> &'static str {
        match self {
            RelayError::Serialization(_) => "Failed to encode notifications",
            _ => "Failed to fetch notifications",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.public_message().to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_is_generic_500() {
        let err = RelayError::store(anyhow::anyhow!("connection refused (os error 111)"));
        assert_eq!(err.public_message(), "Failed to fetch notifications");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn serialization_error_is_500() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RelayError::from(json_err);
        assert_eq!(err.public_message(), "Failed to encode notifications");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
