//! Queue configuration and status snapshot types.

use std::time::Duration;

use serde::Serialize;

/// Sizing and shutdown behaviour of a [`DispatchQueue`](super::DispatchQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Number of worker tasks. One keeps the backend strictly serialized.
    pub workers: usize,
    /// Maximum number of tasks waiting in the queue.
    pub capacity: usize,
    /// How long `stop` waits for each worker before aborting it.
    pub join_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            capacity: 4096,
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl DispatchConfig {
    /// Set the worker count. Zero is raised to one.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub const fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }
}

/// Point-in-time view of the queue, as exposed on the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub running: bool,
    /// Tasks waiting for a worker.
    pub queued: usize,
    pub total_submitted: u64,
    /// Tasks whose work returned audio.
    pub completed: u64,
    /// Tasks whose work returned an error.
    pub failed: u64,
    /// Tasks completed with `Cancelled` (session cancelled or shutdown).
    pub cancelled: u64,
    /// Task started earliest among those currently running.
    pub active_task_id: Option<String>,
    pub active_tasks: usize,
    pub workers: usize,
}
