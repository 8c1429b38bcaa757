//! Dispatch queue lifecycle errors.

use thiserror::Error;

/// Errors raised by [`DispatchQueue`](crate::DispatchQueue) lifecycle
/// operations and strict submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Dispatch queue is already running")]
    AlreadyRunning,

    #[error("Dispatch queue is not running")]
    NotRunning,

    #[error("Dispatch queue is full ({capacity} tasks queued)")]
    QueueFull { capacity: usize },

    #[error("Worker {worker} did not stop within the join timeout")]
    JoinTimeout { worker: usize },
}

impl From<DispatchError> for voiceforge_core::SynthesisError {
    fn from(err: DispatchError) -> Self {
        Self::rejected(err.to_string())
    }
}
