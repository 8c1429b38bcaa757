//! Single-flight ordered dispatch queue.
//!
//! A priority queue feeds a fixed pool of worker tasks. Each worker runs
//! one task at a time, so with a single worker the backend never sees two
//! concurrent calls and execution order equals priority order.
//!
//! # Guarantees
//!
//! - Every accepted task's completion callback fires exactly once: with the
//!   work's result, with `Cancelled` when its session token fires or the
//!   queue stops first, or with `Internal` when the work panics.
//! - Equal priorities run in submission order (monotonic sequence number).
//! - A failing or panicking task never takes its worker down.

mod status;
mod task;

use std::collections::BinaryHeap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use voiceforge_core::SynthesisError;

use crate::error::DispatchError;

pub use status::{DispatchConfig, QueueStatus};
pub use task::{DispatchTask, TaskCompletion};
use task::QueuedTask;

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedTask>,
    running: bool,
    /// Pending stop signals, one per worker; they outrank queued tasks.
    stop_signals: usize,
    next_seq: u64,
    total_submitted: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
    /// Running task ids in start order.
    active: Vec<String>,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.heap.is_empty() && self.active.is_empty()
    }
}

enum Next {
    Task(DispatchTask),
    Stop,
    Idle,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Wakes workers when tasks or stop signals arrive.
    work_ready: Notify,
    /// Wakes `wait_idle` callers.
    idle: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // State stays consistent across a poisoned lock: every critical
        // section is a handful of field updates with no panicking calls.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_job(&self) -> Next {
        let mut state = self.lock();
        if state.stop_signals > 0 {
            state.stop_signals -= 1;
            if state.stop_signals > 0 {
                self.work_ready.notify_one();
            }
            return Next::Stop;
        }
        match state.heap.pop() {
            Some(queued) => {
                if !state.heap.is_empty() {
                    self.work_ready.notify_one();
                }
                Next::Task(queued.task)
            }
            None => Next::Idle,
        }
    }

    fn mark_active(&self, task_id: &str) {
        self.lock().active.push(task_id.to_string());
    }

    fn finish(&self, task_id: &str, result: &Result<Bytes, SynthesisError>) {
        let mut state = self.lock();
        if let Some(pos) = state.active.iter().position(|id| id == task_id) {
            state.active.remove(pos);
        }
        match result {
            Ok(_) => state.completed += 1,
            Err(SynthesisError::Cancelled) => state.cancelled += 1,
            Err(_) => state.failed += 1,
        }
        if state.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Process-wide admission control in front of a single-concurrency backend.
///
/// Construct one instance at startup, [`start`](Self::start) it, share it
/// through an `Arc` and [`stop`](Self::stop) it on shutdown.
pub struct DispatchQueue {
    config: DispatchConfig,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchQueue {
    pub fn new(config: DispatchConfig) -> Self {
        info!(
            workers = config.workers,
            capacity = config.capacity,
            "Dispatch queue created"
        );
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                work_ready: Notify::new(),
                idle: Notify::new(),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Spawn the worker pool. Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<(), DispatchError> {
        {
            let mut state = self.shared.lock();
            if state.running {
                return Err(DispatchError::AlreadyRunning);
            }
            state.running = true;
            state.stop_signals = 0;
        }

        let mut handles = self.handles_lock();
        for worker in 0..self.config.workers {
            let shared = Arc::clone(&self.shared);
            handles.push(tokio::spawn(worker_loop(shared, worker)));
        }
        // Tasks may have raced in between flipping `running` and spawning.
        self.shared.work_ready.notify_one();

        info!(workers = self.config.workers, "Dispatch queue started");
        Ok(())
    }

    /// Stop the workers and cancel everything still queued.
    ///
    /// Queued tasks complete with [`SynthesisError::Cancelled`] before this
    /// returns. In-flight tasks get up to `join_timeout` per worker to
    /// finish; a worker that overruns is aborted and its task reports
    /// `Cancelled`.
    pub async fn stop(&self) -> Result<(), DispatchError> {
        let drained: Vec<DispatchTask> = {
            let mut state = self.shared.lock();
            if !state.running {
                return Err(DispatchError::NotRunning);
            }
            state.running = false;
            state.stop_signals = self.config.workers;
            let drained: Vec<DispatchTask> = state.heap.drain().map(|q| q.task).collect();
            state.cancelled += drained.len() as u64;
            drained
        };
        let handles = std::mem::take(&mut *self.handles_lock());

        if !drained.is_empty() {
            info!(count = drained.len(), "Cancelling queued tasks on shutdown");
        }
        for task in drained {
            task.complete_without_running(Err(SynthesisError::Cancelled));
        }
        self.shared.work_ready.notify_one();

        let mut overrun = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.config.join_timeout, handle)
                .await
                .is_err()
            {
                warn!(
                    worker,
                    timeout_ms = self.config.join_timeout.as_millis(),
                    "Worker did not stop in time, aborting"
                );
                abort.abort();
                overrun.get_or_insert(worker);
            }
        }

        {
            let mut state = self.shared.lock();
            state.stop_signals = 0;
            // Tasks still active belonged to aborted workers; their guards
            // already reported `Cancelled`.
            let aborted = state.active.len() as u64;
            state.cancelled += aborted;
            state.active.clear();
        }
        self.shared.idle.notify_waiters();
        info!("Dispatch queue stopped");

        overrun.map_or(Ok(()), |worker| Err(DispatchError::JoinTimeout { worker }))
    }

    /// Queue a task, returning whether it was accepted.
    ///
    /// A rejected task is dropped without invoking its callback.
    pub fn submit(&self, task: DispatchTask) -> bool {
        let task_id = task.task_id.clone();
        match self.try_submit(task) {
            Ok(()) => true,
            Err(err) => {
                error!(task_id = %task_id, error = %err, "Task rejected");
                false
            }
        }
    }

    /// Queue a task, reporting why it was refused.
    pub fn try_submit(&self, task: DispatchTask) -> Result<(), DispatchError> {
        {
            let mut state = self.shared.lock();
            if !state.running {
                return Err(DispatchError::NotRunning);
            }
            if state.heap.len() >= self.config.capacity {
                return Err(DispatchError::QueueFull {
                    capacity: self.config.capacity,
                });
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.total_submitted += 1;
            debug!(
                task_id = %task.task_id,
                priority = task.priority,
                queued = state.heap.len() + 1,
                "Task submitted"
            );
            state.heap.push(QueuedTask { seq, task });
        }
        self.shared.work_ready.notify_one();
        Ok(())
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.shared.lock();
        QueueStatus {
            running: state.running,
            queued: state.heap.len(),
            total_submitted: state.total_submitted,
            completed: state.completed,
            failed: state.failed,
            cancelled: state.cancelled,
            active_task_id: state.active.first().cloned(),
            active_tasks: state.active.len(),
            workers: if state.running { self.config.workers } else { 0 },
        }
    }

    /// Wait until nothing is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn handles_lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        for handle in self.handles_lock().drain(..) {
            handle.abort();
        }
    }
}

async fn worker_loop(shared: Arc<Shared>, worker: usize) {
    debug!(worker, "Dispatch worker started");
    loop {
        match shared.next_job() {
            Next::Task(task) => run_task(&shared, worker, task).await,
            Next::Stop => break,
            Next::Idle => shared.work_ready.notified().await,
        }
    }
    debug!(worker, "Dispatch worker stopped");
}

async fn run_task(shared: &Shared, worker: usize, task: DispatchTask) {
    if task.is_cancelled() {
        debug!(task_id = %task.task_id, "Skipping task of cancelled session");
        shared.mark_active(task.task_id());
        let task_id = task.task_id.clone();
        let result = Err(SynthesisError::Cancelled);
        shared.finish(&task_id, &result);
        task.complete_without_running(result);
        return;
    }

    let (work, cancel, guard) = task.into_parts();
    let task_id = guard.task_id().to_string();
    shared.mark_active(&task_id);
    debug!(worker, task_id = %task_id, "Task started");
    let started = Instant::now();

    let work = AssertUnwindSafe(async move { work().await }).catch_unwind();
    let outcome = match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Ok(Err(SynthesisError::Cancelled)),
                outcome = work => outcome,
            }
        }
        None => work.await,
    };
    let result = outcome.unwrap_or_else(|_| {
        error!(worker, task_id = %task_id, "Task panicked");
        Err(SynthesisError::Internal(format!("task {task_id} panicked")))
    });

    let elapsed_ms = started.elapsed().as_millis();
    match &result {
        Ok(audio) => debug!(task_id = %task_id, elapsed_ms, bytes = audio.len(), "Task completed"),
        Err(SynthesisError::Cancelled) => debug!(task_id = %task_id, elapsed_ms, "Task cancelled"),
        Err(err) => warn!(task_id = %task_id, elapsed_ms, error = %err, "Task failed"),
    }

    shared.finish(&task_id, &result);
    guard.complete(result);
}
