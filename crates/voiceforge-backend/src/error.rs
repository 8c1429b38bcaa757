//! Errors for the HTTP speech backend.
//!
//! These errors stay inside `voiceforge-backend` and are mapped to
//! [`SynthesisError`] at the port boundary.

use thiserror::Error;
use voiceforge_core::SynthesisError;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Longest slice of an unrecognised error body kept in a message.
const BODY_EXCERPT_CHARS: usize = 100;

/// Errors raised while talking to the synthesis service.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service answered with a non-success status.
    #[error("API request failed with status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Friendly description
        message: String,
    },

    /// The request exceeded its timeout.
    #[error("Request timed out")]
    Timeout,

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The service answered with something unusable.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what was invalid
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl BackendError {
    /// Classify a reqwest error, pulling timeouts out of the generic case.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err)
        }
    }

    /// Whether the transport layer should try again.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_retry_status(*status),
            Self::Network(err) => err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}

/// Statuses retried by the transport layer.
pub(crate) const fn is_retry_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Short, user-facing message for a failed response.
///
/// Well-known statuses get a fixed message; otherwise the JSON `error`
/// field is used, falling back to the start of the raw body.
pub fn friendly_message(status: u16, body: &str) -> String {
    match status {
        401 => "Invalid API key".to_string(),
        403 => "Access denied".to_string(),
        404 => "Service unavailable".to_string(),
        429 => "Too many requests, please try again later".to_string(),
        500 => "Internal server error".to_string(),
        _ => error_field(body).unwrap_or_else(|| body.chars().take(BODY_EXCERPT_CHARS).collect()),
    }
}

fn error_field(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Object(inner) => inner
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string),
        _ => None,
    }
}

impl From<BackendError> for SynthesisError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, message } => Self::backend(status, message),
            BackendError::Timeout => Self::Timeout,
            BackendError::Network(e) if e.is_timeout() => Self::Timeout,
            BackendError::Network(e) => Self::transport(e.to_string()),
            BackendError::InvalidResponse { message } => Self::transport(message),
            BackendError::InvalidUrl(e) => Self::Internal(format!("invalid backend URL: {e}")),
            BackendError::Client(message) => Self::Internal(message),
        }
    }
}
