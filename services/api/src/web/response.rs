//! services/api/src/web/response.rs
//!
//! The JSON error envelope returned by every endpoint and its mapping from
//! port errors to HTTP status codes.

use activity_planner_core::{GenerationCause, PortError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// Body of every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable cause.
    pub error: String,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PortError> for HttpError {
    fn from(e: PortError) -> Self {
        let status = match &e {
            PortError::NotFound(_) => StatusCode::NOT_FOUND,
            PortError::InvalidInput(_)
            | PortError::UnsupportedProvider(_)
            | PortError::MissingCredential(_) => StatusCode::BAD_REQUEST,
            PortError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PortError::Generation {
                cause: GenerationCause::Timeout(_),
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            PortError::Generation { .. } => StatusCode::BAD_GATEWAY,
            PortError::Unexpected(detail) => {
                error!(error = %detail, "Unexpected failure while serving request");
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred",
                );
            }
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_planner_core::Provider;
    use std::time::Duration;

    #[test]
    fn port_errors_map_to_statuses() {
        let cases = [
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PortError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (PortError::UnsupportedProvider("x".into()), StatusCode::BAD_REQUEST),
            (PortError::MissingCredential(Provider::Groq), StatusCode::BAD_REQUEST),
            (PortError::ProviderUnavailable(Provider::Groq), StatusCode::SERVICE_UNAVAILABLE),
            (
                PortError::generation(Provider::Gemini, GenerationCause::Timeout(Duration::from_secs(5))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                PortError::generation(Provider::Gemini, GenerationCause::EmptyResponse),
                StatusCode::BAD_GATEWAY,
            ),
            (PortError::Unexpected("pool closed".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(HttpError::from(error).status(), status);
        }
    }

    #[test]
    fn unexpected_details_are_not_exposed() {
        let e = HttpError::from(PortError::Unexpected("connection refused at 10.0.0.3".into()));
        assert!(!e.message.contains("10.0.0.3"));
    }
}
