//! Work items accepted by the dispatch queue.

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use voiceforge_core::SynthesisError;

/// Result handed to a task's completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    pub task_id: String,
    pub result: Result<Bytes, SynthesisError>,
}

impl TaskCompletion {
    pub const fn is_failed(&self) -> bool {
        self.result.is_err()
    }
}

type WorkFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<Bytes, SynthesisError>> + Send>;
type CompletionFn = Box<dyn FnOnce(TaskCompletion) + Send>;

/// A unit of work plus the callback that receives its outcome.
///
/// The work closure is only invoked once a worker picks the task up, so
/// nothing runs while the task waits in the queue.
pub struct DispatchTask {
    pub(crate) task_id: String,
    pub(crate) priority: usize,
    pub(crate) work: WorkFn,
    pub(crate) on_complete: CompletionFn,
    pub(crate) cancel: Option<CancellationToken>,
}

impl DispatchTask {
    /// Create a task. Lower `priority` values run first.
    pub fn new<W, Fut, C>(task_id: impl Into<String>, priority: usize, work: W, on_complete: C) -> Self
    where
        W: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Bytes, SynthesisError>> + Send + 'static,
        C: FnOnce(TaskCompletion) + Send + 'static,
    {
        Self {
            task_id: task_id.into(),
            priority,
            work: Box::new(move || Box::pin(work())),
            on_complete: Box::new(on_complete),
            cancel: None,
        }
    }

    /// Tie the task to a session token. A cancelled task completes with
    /// [`SynthesisError::Cancelled`] without (or instead of) running.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub const fn priority(&self) -> usize {
        self.priority
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Split into the parts a worker needs, arming the completion guard.
    pub(crate) fn into_parts(self) -> (WorkFn, Option<CancellationToken>, CompletionGuard) {
        let guard = CompletionGuard {
            task_id: self.task_id,
            on_complete: Some(self.on_complete),
        };
        (self.work, self.cancel, guard)
    }

    /// Complete the task with `result` without running it.
    pub(crate) fn complete_without_running(self, result: Result<Bytes, SynthesisError>) {
        let (_, _, guard) = self.into_parts();
        guard.complete(result);
    }
}

impl fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTask")
            .field("task_id", &self.task_id)
            .field("priority", &self.priority)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// Fires the completion callback exactly once.
///
/// If the guard is dropped before [`complete`](Self::complete) (worker
/// aborted, panic while unwinding), the callback receives `Cancelled`.
pub(crate) struct CompletionGuard {
    task_id: String,
    on_complete: Option<CompletionFn>,
}

impl CompletionGuard {
    pub(crate) fn task_id(&self) -> &str {
        &self.task_id
    }

    pub(crate) fn complete(mut self, result: Result<Bytes, SynthesisError>) {
        self.fire(result);
    }

    fn fire(&mut self, result: Result<Bytes, SynthesisError>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(TaskCompletion {
                task_id: std::mem::take(&mut self.task_id),
                result,
            });
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.fire(Err(SynthesisError::Cancelled));
    }
}

/// Heap entry: lowest priority first, then submission order.
pub(crate) struct QueuedTask {
    pub(crate) seq: u64,
    pub(crate) task: DispatchTask,
}

impl QueuedTask {
    const fn key(&self) -> (usize, u64) {
        (self.task.priority, self.seq)
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // BinaryHeap is a max-heap; invert so the smallest key pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;
    use std::sync::{Arc, Mutex};

    fn task(id: &str, priority: usize) -> DispatchTask {
        DispatchTask::new(id, priority, || async { Ok(Bytes::new()) }, |_| {})
    }

    #[test]
    fn heap_pops_by_priority_then_submission() {
        let mut heap = BinaryHeap::new();
        for (seq, (id, priority)) in [("b0", 1), ("a0", 0), ("b1", 1), ("a1", 0)]
            .into_iter()
            .enumerate()
        {
            heap.push(QueuedTask {
                seq: seq as u64,
                task: task(id, priority),
            });
        }
        let order: Vec<String> = std::iter::from_fn(|| heap.pop())
            .map(|q| q.task.task_id)
            .collect();
        assert_eq!(order, vec!["a0", "a1", "b0", "b1"]);
    }

    #[test]
    fn dropped_guard_reports_cancelled_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let task = DispatchTask::new(
            "segment_0",
            0,
            || async { Ok(Bytes::new()) },
            move |completion| sink.lock().unwrap().push(completion),
        );

        let (_work, _cancel, guard) = task.into_parts();
        drop(guard);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].task_id, "segment_0");
        assert_eq!(seen[0].result, Err(SynthesisError::Cancelled));
    }

    #[test]
    fn completed_guard_does_not_fire_again() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let task = DispatchTask::new(
            "segment_1",
            1,
            || async { Ok(Bytes::new()) },
            move |_| *counter.lock().unwrap() += 1,
        );

        task.complete_without_running(Ok(Bytes::from_static(b"x")));
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
