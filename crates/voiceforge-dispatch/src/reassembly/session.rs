//! Async driver that turns completion callbacks into an ordered stream.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use voiceforge_core::{
    AudioFormat, GenerationLog, GenerationMode, GenerationRecord, GenerationStatus,
    SpeechRequest, SynthesisError,
};

use super::{CompletionRecord, Reassembler};

/// Ordered audio chunks. An `Err` item is always last and means the
/// output is truncated.
pub type SpeechStream = Pin<Box<dyn Stream<Item = Result<Bytes, SynthesisError>> + Send>>;

/// Request attributes copied into every [`GenerationRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSummary {
    pub text_length: usize,
    pub voice: String,
    pub format: AudioFormat,
    pub speed: f32,
    pub mode: GenerationMode,
}

impl RequestSummary {
    pub fn new(request: &SpeechRequest, mode: GenerationMode) -> Self {
        Self {
            text_length: request.text_length(),
            voice: request.voice.clone(),
            format: request.response_format,
            speed: request.speed,
            mode,
        }
    }

    pub fn to_record(
        &self,
        duration: Duration,
        audio_size_bytes: u64,
        status: GenerationStatus,
        error_message: Option<String>,
    ) -> GenerationRecord {
        GenerationRecord {
            timestamp: Utc::now(),
            text_length: self.text_length,
            voice: self.voice.clone(),
            format: self.format,
            speed: self.speed,
            mode: self.mode,
            duration_seconds: duration.as_secs_f64(),
            audio_size_bytes,
            status,
            error_message,
        }
    }
}

/// State of one generation from submission until the stream closes.
///
/// Owned by the stream it drives. Dropping an unfinished session (client
/// went away) cancels its outstanding units and logs the truncation.
pub struct StreamSession {
    request_id: Uuid,
    reassembler: Reassembler,
    summary: RequestSummary,
    started_at: Instant,
    ended_at: Option<Instant>,
    deadline: Duration,
    cancel: CancellationToken,
    log: Arc<dyn GenerationLog>,
}

impl StreamSession {
    pub(crate) fn new(
        request_id: Uuid,
        reassembler: Reassembler,
        summary: RequestSummary,
        deadline: Duration,
        cancel: CancellationToken,
        log: Arc<dyn GenerationLog>,
    ) -> Self {
        Self {
            request_id,
            reassembler,
            summary,
            started_at: Instant::now(),
            ended_at: None,
            deadline,
            cancel,
            log,
        }
    }

    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub const fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn elapsed(&self) -> Duration {
        self.ended_at.unwrap_or_else(Instant::now) - self.started_at
    }

    /// Consume completions until every unit is accounted for, the deadline
    /// passes, or a failed unit aborts the session.
    pub(crate) fn into_stream(
        self,
        mut completions: mpsc::UnboundedReceiver<CompletionRecord>,
    ) -> SpeechStream {
        Box::pin(async_stream::stream! {
            let mut session = self;
            let deadline = tokio::time::sleep_until(session.started_at + session.deadline);
            tokio::pin!(deadline);

            for chunk in session.reassembler.drain() {
                yield Ok(chunk);
            }

            while !session.reassembler.is_finished() {
                tokio::select! {
                    received = completions.recv() => match received {
                        Some(completion) => {
                            session.accept(completion);
                            while let Ok(more) = completions.try_recv() {
                                session.accept(more);
                            }
                        }
                        None => session.reassembler.abort(SynthesisError::Internal(
                            "completion channel closed before all units reported".to_string(),
                        )),
                    },
                    () = &mut deadline => {
                        let seconds = session.deadline.as_secs();
                        warn!(request_id = %session.request_id, seconds, "Generation deadline exceeded");
                        session.reassembler.abort(SynthesisError::GenerationTimeout { seconds });
                    }
                }

                for chunk in session.reassembler.drain() {
                    debug!(
                        request_id = %session.request_id,
                        emitted = session.reassembler.emitted_prefix(),
                        total = session.reassembler.total_units(),
                        bytes = chunk.len(),
                        "Emitting chunk"
                    );
                    yield Ok(chunk);
                }
            }

            if let Some(err) = session.finish() {
                yield Err(err);
            }
        })
    }

    fn accept(&mut self, completion: CompletionRecord) {
        let index = completion.index;
        if let Err(err) = &completion.outcome {
            warn!(request_id = %self.request_id, index, error = %err, "Unit failed");
        }
        if !self.reassembler.record(completion) {
            debug!(request_id = %self.request_id, index, "Ignoring late or duplicate completion");
        }
    }

    /// Close the session, log its record and return the terminal error.
    fn finish(&mut self) -> Option<SynthesisError> {
        self.ended_at = Some(Instant::now());
        self.cancel.cancel();

        let elapsed = self.elapsed();
        let bytes = self.reassembler.bytes_emitted();
        let terminal = self.reassembler.terminal_error().cloned();

        let record = match &terminal {
            None => {
                let skipped = self.reassembler.skipped();
                let note = (!skipped.is_empty()).then(|| {
                    let indices: Vec<usize> = skipped.iter().map(|(index, _)| *index).collect();
                    format!(
                        "skipped {} of {} units: {indices:?}",
                        skipped.len(),
                        self.reassembler.total_units()
                    )
                });
                info!(
                    request_id = %self.request_id,
                    mode = %self.summary.mode,
                    units = self.reassembler.total_units(),
                    skipped = skipped.len(),
                    bytes,
                    elapsed_ms = elapsed.as_millis(),
                    "Generation completed"
                );
                self.summary
                    .to_record(elapsed, bytes, GenerationStatus::Success, note)
            }
            Some(err) => {
                error!(
                    request_id = %self.request_id,
                    mode = %self.summary.mode,
                    emitted = self.reassembler.emitted_prefix(),
                    units = self.reassembler.total_units(),
                    bytes,
                    elapsed_ms = elapsed.as_millis(),
                    error = %err,
                    "Generation aborted"
                );
                self.summary
                    .to_record(elapsed, bytes, GenerationStatus::Error, Some(err.to_string()))
            }
        };
        self.log.record(record);

        terminal
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.ended_at.is_some() {
            return;
        }
        self.ended_at = Some(Instant::now());
        self.cancel.cancel();
        self.reassembler.abort(SynthesisError::Cancelled);

        let elapsed = self.elapsed();
        let bytes = self.reassembler.bytes_emitted();
        warn!(
            request_id = %self.request_id,
            emitted = self.reassembler.emitted_prefix(),
            units = self.reassembler.total_units(),
            bytes,
            elapsed_ms = elapsed.as_millis(),
            "Stream dropped before completion, cancelling remaining units"
        );
        self.log.record(self.summary.to_record(
            elapsed,
            bytes,
            GenerationStatus::Error,
            Some("stream closed before completion".to_string()),
        ));
    }
}
