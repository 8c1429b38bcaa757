//! Ordered reassembly of out-of-order completions.
//!
//! [`Reassembler`] is a pure state machine: completions are recorded in any
//! order and [`Reassembler::drain`] releases the longest run of
//! consecutive indices starting at the emission cursor. The async driver
//! lives in [`session`].
//!
//! # States
//!
//! `Submitting → AwaitingCompletions → Draining → { Completed | Aborted }`,
//! with `Draining` returning to `AwaitingCompletions` while units are
//! still outstanding.

pub mod session;

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;
use voiceforge_core::{FailurePolicy, SynthesisError};

/// Lifecycle of one generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Units are still being handed to the dispatch queue.
    Submitting,
    /// Every unit is submitted; waiting for the next completion.
    AwaitingCompletions,
    /// Releasing a run of in-order completions.
    Draining,
    /// Every unit has been emitted (or skipped).
    Completed,
    /// Ended early by a failed unit, a deadline or cancellation.
    Aborted,
}

impl SessionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Outcome of one unit as reported by its completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub index: usize,
    pub outcome: Result<Bytes, SynthesisError>,
}

impl CompletionRecord {
    pub const fn failed(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Buffers completions and releases them strictly in index order.
///
/// Indices below the cursor have been emitted or skipped exactly once;
/// the cursor only moves forward, so no index is ever released twice.
#[derive(Debug)]
pub struct Reassembler {
    total_units: usize,
    policy: FailurePolicy,
    state: SessionState,
    pending: BTreeMap<usize, Result<Bytes, SynthesisError>>,
    /// Next index to release; `0..cursor` is the emitted prefix.
    cursor: usize,
    completed_count: usize,
    chunks_emitted: usize,
    bytes_emitted: u64,
    skipped: Vec<(usize, SynthesisError)>,
    terminal_error: Option<SynthesisError>,
}

impl Reassembler {
    pub const fn new(total_units: usize, policy: FailurePolicy) -> Self {
        Self {
            total_units,
            policy,
            state: SessionState::Submitting,
            pending: BTreeMap::new(),
            cursor: 0,
            completed_count: 0,
            chunks_emitted: 0,
            bytes_emitted: 0,
            skipped: Vec::new(),
            terminal_error: None,
        }
    }

    /// Mark submission as done. An empty session completes immediately.
    pub fn submission_finished(&mut self) {
        if self.state == SessionState::Submitting {
            self.state = if self.total_units == 0 {
                SessionState::Completed
            } else {
                SessionState::AwaitingCompletions
            };
        }
    }

    /// Store a completion. Returns `false` if it was ignored: index out of
    /// range, already recorded, or the session already ended.
    pub fn record(&mut self, completion: CompletionRecord) -> bool {
        let index = completion.index;
        if self.state.is_terminal()
            || index >= self.total_units
            || index < self.cursor
            || self.pending.contains_key(&index)
        {
            return false;
        }
        self.pending.insert(index, completion.outcome);
        self.completed_count += 1;
        true
    }

    /// Release every chunk that is now in order.
    ///
    /// A failed unit at the cursor either aborts the session (chunks before
    /// it are still returned) or is skipped, depending on the policy.
    pub fn drain(&mut self) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        if self.state.is_terminal() {
            return chunks;
        }
        let resume = if self.state == SessionState::Submitting {
            SessionState::Submitting
        } else {
            SessionState::AwaitingCompletions
        };
        self.state = SessionState::Draining;

        while let Some(outcome) = self.pending.remove(&self.cursor) {
            match outcome {
                Ok(audio) => {
                    self.chunks_emitted += 1;
                    self.bytes_emitted += audio.len() as u64;
                    chunks.push(audio);
                }
                Err(err) => match self.policy {
                    FailurePolicy::Abort => {
                        self.cursor += 1;
                        self.fail(err);
                        return chunks;
                    }
                    FailurePolicy::Skip => self.skipped.push((self.cursor, err)),
                },
            }
            self.cursor += 1;
        }

        self.state = if self.cursor < self.total_units {
            resume
        } else if self.chunks_emitted == 0 {
            // Skipping every unit leaves nothing to deliver.
            let err = self
                .skipped
                .first()
                .map_or(SynthesisError::Cancelled, |(_, err)| err.clone());
            self.terminal_error = Some(err);
            SessionState::Aborted
        } else {
            SessionState::Completed
        };

        chunks
    }

    /// End the session early. No-op once the session has ended.
    pub fn abort(&mut self, error: SynthesisError) {
        if !self.state.is_terminal() {
            self.fail(error);
        }
    }

    fn fail(&mut self, error: SynthesisError) {
        self.terminal_error = Some(error);
        self.state = SessionState::Aborted;
        self.pending.clear();
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub const fn total_units(&self) -> usize {
        self.total_units
    }

    /// Number of leading indices already released or skipped.
    pub const fn emitted_prefix(&self) -> usize {
        self.cursor
    }

    pub const fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub const fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted
    }

    /// Failed units that were skipped, in index order.
    pub fn skipped(&self) -> &[(usize, SynthesisError)] {
        &self.skipped
    }

    pub const fn terminal_error(&self) -> Option<&SynthesisError> {
        self.terminal_error.as_ref()
    }
}
