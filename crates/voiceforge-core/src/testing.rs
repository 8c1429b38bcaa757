//! Scripted backend and helpers for tests across the workspace.
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for dependants.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::domain::{SynthesisUnit, VoiceParams};
use crate::error::SynthesisError;
use crate::ports::SpeechBackend;

/// Audio the scripted backend returns for a given unit index.
pub fn audio_for(index: usize) -> Bytes {
    Bytes::from(format!("audio-{index};"))
}

#[derive(Debug, Clone)]
struct Failure {
    remaining: Option<u32>,
    error: SynthesisError,
}

#[derive(Debug, Default)]
struct Script {
    failures: HashMap<usize, Failure>,
    delays: HashMap<usize, Duration>,
    gates: HashMap<usize, Arc<Notify>>,
    attempts: HashMap<usize, u32>,
    call_order: Vec<usize>,
}

/// A [`SpeechBackend`] whose behaviour is scripted per unit index.
///
/// Successful calls return [`audio_for`]`(index)`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `times` attempts for `index`, then succeed.
    pub fn fail_times(self, index: usize, times: u32, error: SynthesisError) -> Self {
        self.script.lock().unwrap().failures.insert(
            index,
            Failure {
                remaining: Some(times),
                error,
            },
        );
        self
    }

    /// Fail every attempt for `index`.
    pub fn always_fail(self, index: usize, error: SynthesisError) -> Self {
        self.script.lock().unwrap().failures.insert(
            index,
            Failure {
                remaining: None,
                error,
            },
        );
        self
    }

    /// Sleep for `delay` before answering `index`.
    pub fn with_delay(self, index: usize, delay: Duration) -> Self {
        self.script.lock().unwrap().delays.insert(index, delay);
        self
    }

    /// Hold calls for `index` until the returned handle is notified.
    pub fn gate(&self, index: usize) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script
            .lock()
            .unwrap()
            .gates
            .insert(index, Arc::clone(&gate));
        gate
    }

    /// Number of attempts made for `index` so far.
    pub fn attempts(&self, index: usize) -> u32 {
        self.script
            .lock()
            .unwrap()
            .attempts
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    /// Unit indices in the order calls started, retries included.
    pub fn call_order(&self) -> Vec<usize> {
        self.script.lock().unwrap().call_order.clone()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechBackend for ScriptedBackend {
    async fn synthesize(
        &self,
        unit: &SynthesisUnit,
        _params: &VoiceParams,
    ) -> Result<Bytes, SynthesisError> {
        let index = unit.index();
        let (delay, gate, failure) = {
            let mut script = self.script.lock().unwrap();
            *script.attempts.entry(index).or_insert(0) += 1;
            script.call_order.push(index);
            let failure = script.failures.get_mut(&index).and_then(|failure| {
                match failure.remaining.as_mut() {
                    None => Some(failure.error.clone()),
                    Some(0) => None,
                    Some(remaining) => {
                        *remaining -= 1;
                        Some(failure.error.clone())
                    }
                }
            });
            (
                script.delays.get(&index).copied(),
                script.gates.get(&index).cloned(),
                failure,
            )
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(error) => Err(error),
            None => Ok(audio_for(index)),
        }
    }

    async fn list_models(&self, _api_key: Option<&str>) -> Result<serde_json::Value, SynthesisError> {
        Ok(serde_json::json!({
            "object": "list",
            "data": [{ "id": "tts-1" }, { "id": "tts-1-hd" }]
        }))
    }
}
