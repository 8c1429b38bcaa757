//! Error taxonomy for speech generation.
//!
//! These errors are designed to be cloneable and serializable so they can be
//! carried through completion callbacks, stored in generation records and
//! mapped to HTTP responses without depending on transport error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while turning text into audio.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SynthesisError {
    /// The backend answered with a non-success HTTP status.
    #[error("Backend error ({status}): {message}")]
    Backend {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Friendly description of the failure.
        message: String,
    },

    /// A single backend request exceeded its timeout.
    #[error("Backend request timed out")]
    Timeout,

    /// Connection refused, DNS failure, broken body, etc.
    #[error("Transport error: {message}")]
    Transport {
        /// Detailed error message.
        message: String,
    },

    /// A unit exhausted its retry attempts.
    #[error("Unit {index} failed after {attempts} attempts: {message}")]
    UnitFailed {
        /// Sequence index of the failed unit.
        index: usize,
        /// Number of attempts that were made.
        attempts: u32,
        /// Message of the last underlying failure.
        message: String,
    },

    /// The whole generation exceeded its total-length budget.
    #[error("Generation exceeded its {seconds}s budget")]
    GenerationTimeout {
        /// Budget that was exceeded, in seconds.
        seconds: u64,
    },

    /// The session was cancelled or the queue shut down before the task ran.
    #[error("Request cancelled")]
    Cancelled,

    /// The dispatch queue refused the task (stopped or full).
    #[error("Dispatch queue rejected the task: {reason}")]
    Rejected {
        /// Why the task was refused.
        reason: String,
    },

    /// The request failed validation.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A work item panicked or its task was lost.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SynthesisError {
    /// Create a backend error from an HTTP status and message.
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Whether the application-level retry loop should try again.
    ///
    /// Cancellation and validation failures are final; everything coming
    /// from the network edge is worth another attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. } | Self::Timeout | Self::Transport { .. }
        )
    }

    /// HTTP-equivalent status for callers that receive a structured error.
    pub const fn status_hint(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Backend { status, .. } if *status >= 400 && *status < 500 => *status,
            Self::Backend { .. } | Self::Transport { .. } | Self::UnitFailed { .. } => 502,
            Self::Timeout | Self::GenerationTimeout { .. } => 504,
            Self::Rejected { .. } => 503,
            Self::Cancelled => 499,
            Self::Internal(_) => 500,
        }
    }
}
