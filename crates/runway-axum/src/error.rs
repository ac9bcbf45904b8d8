//! Gateway error type and its mapping from registry errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use runway_core::ports::{BackendError, RegistryError};
use serde::Serialize;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No runner passed its health probe.
    #[error("No backend available")]
    NoBackendAvailable,

    /// The requested runner failed its probe.
    #[error("Runner unhealthy: {0}")]
    Unhealthy(String),

    /// A backend answered with an error or could not be reached.
    #[error("Backend error: {message}")]
    BadGateway {
        message: String,
        upstream_status: Option<u16>,
        upstream_body: Option<String>,
    },

    /// A local backend process failed to start or stop.
    #[error("Backend process error: {0}")]
    Process(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    /// Stable error type discriminant for client-side handling
    #[serde(rename = "type")]
    error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

impl HttpError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoBackendAvailable | Self::Unhealthy(_) | Self::Process(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "invalid_request",
            Self::NoBackendAvailable => "no_backend_available",
            Self::Unhealthy(_) => "runner_unhealthy",
            Self::BadGateway { .. } => "backend_error",
            Self::Process(_) => "process_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let metadata = match &self {
            Self::BadGateway {
                upstream_status,
                upstream_body,
                ..
            } => Some(serde_json::json!({
                "upstreamStatus": upstream_status,
                "upstreamBody": upstream_body,
            })),
            _ => None,
        };

        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
            error_type: self.error_type(),
            metadata,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<RegistryError> for HttpError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NoBackendAvailable => Self::NoBackendAvailable,
            RegistryError::UnknownRunner(name) => Self::NotFound(format!("Unknown runner: {name}")),
            RegistryError::Unhealthy(name) => Self::Unhealthy(name),
            RegistryError::Build(e) => Self::BadRequest(e.to_string()),
            RegistryError::Backend(e) => e.into(),
        }
    }
}

impl From<BackendError> for HttpError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, body } => Self::BadGateway {
                message: format!("backend returned status {status}"),
                upstream_status: Some(status),
                upstream_body: Some(body),
            },
            BackendError::Process(e) => Self::Process(e.to_string()),
            BackendError::NotRunning => Self::Process(err.to_string()),
            other => Self::BadGateway {
                message: other.to_string(),
                upstream_status: None,
                upstream_body: None,
            },
        }
    }
}
