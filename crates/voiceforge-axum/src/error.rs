//! Axum-specific error types and mappings.
//!
//! Maps [`SynthesisError`] and request rejections to HTTP status codes and
//! JSON bodies.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use voiceforge_core::SynthesisError;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The upstream service refused the request for a client-side reason.
    #[error("Upstream rejected the request ({status}): {message}")]
    Upstream { status: StatusCode, message: String },

    /// The upstream service failed.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// The upstream service or the generation budget timed out.
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// The dispatch queue is not accepting work.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The client went away before the work finished.
    #[error("Request cancelled")]
    Cancelled,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            // nginx's "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(msg)
            | Self::BadGateway(msg)
            | Self::GatewayTimeout(msg)
            | Self::ServiceUnavailable(msg)
            | Self::Internal(msg)
            | Self::Upstream { message: msg, .. } => msg,
            Self::Cancelled => "Request cancelled".to_string(),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SynthesisError> for HttpError {
    fn from(err: SynthesisError) -> Self {
        let message = err.to_string();
        match err.status_hint() {
            400 => Self::BadRequest(message),
            499 => Self::Cancelled,
            503 => Self::ServiceUnavailable(message),
            504 => Self::GatewayTimeout(message),
            500 => Self::Internal(message),
            status @ 401..=498 => match StatusCode::from_u16(status) {
                Ok(status) => Self::Upstream { status, message },
                Err(_) => Self::BadGateway(message),
            },
            _ => Self::BadGateway(message),
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
