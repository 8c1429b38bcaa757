//! Generation service: segment, dispatch, reassemble.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use voiceforge_core::{
    FailurePolicy, GenerationLog, GenerationMode, GenerationStatus, RetryPolicy, Segmenter,
    SpeechBackend, SpeechRequest, SynthesisError, timeout_for,
};

use crate::queue::{DispatchQueue, DispatchTask, TaskCompletion};
use crate::reassembly::session::{RequestSummary, SpeechStream, StreamSession};
use crate::reassembly::{CompletionRecord, Reassembler};
use crate::retry::synthesize_with_retry;

/// A complete, non-streamed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAudio {
    pub audio: Bytes,
    pub duration: Duration,
}

impl GeneratedAudio {
    pub fn size(&self) -> usize {
        self.audio.len()
    }
}

/// Turns validated requests into audio through the shared dispatch queue.
///
/// Both entry points run the same pipeline and apply the same
/// [`FailurePolicy`]; they differ only in how the chunks reach the caller.
#[derive(Clone)]
pub struct SpeechService {
    queue: Arc<DispatchQueue>,
    backend: Arc<dyn SpeechBackend>,
    log: Arc<dyn GenerationLog>,
    segmenter: Segmenter,
    retry: RetryPolicy,
    failure_policy: FailurePolicy,
}

impl SpeechService {
    pub fn new(
        queue: Arc<DispatchQueue>,
        backend: Arc<dyn SpeechBackend>,
        log: Arc<dyn GenerationLog>,
    ) -> Self {
        Self {
            queue,
            backend,
            log,
            segmenter: Segmenter::default(),
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub const fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    pub fn backend(&self) -> &Arc<dyn SpeechBackend> {
        &self.backend
    }

    pub fn generation_log(&self) -> &Arc<dyn GenerationLog> {
        &self.log
    }

    pub const fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Start a streaming generation.
    ///
    /// Errors before the first chunk (validation, queue rejection) are
    /// returned here; later failures end the stream with an `Err` item.
    pub fn stream(&self, request: &SpeechRequest) -> Result<SpeechStream, SynthesisError> {
        self.open(request, GenerationMode::Streaming)
    }

    /// Generate the whole audio buffer before returning.
    pub async fn generate(&self, request: &SpeechRequest) -> Result<GeneratedAudio, SynthesisError> {
        let started = Instant::now();
        let mut stream = self.open(request, GenerationMode::Normal)?;

        let mut audio = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);
        }

        Ok(GeneratedAudio {
            audio: audio.freeze(),
            duration: started.elapsed(),
        })
    }

    fn open(
        &self,
        request: &SpeechRequest,
        mode: GenerationMode,
    ) -> Result<SpeechStream, SynthesisError> {
        let summary = RequestSummary::new(request, mode);
        let started = Instant::now();

        if let Err(err) = request.validate() {
            warn!(mode = %mode, error = %err, "Rejected invalid request");
            self.log.record(summary.to_record(
                started.elapsed(),
                0,
                GenerationStatus::Error,
                Some(err.to_string()),
            ));
            return Err(err);
        }

        let request_id = Uuid::new_v4();
        let units = self.segmenter.segment(&request.input);
        let deadline = timeout_for(request.text_length());
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let params = request.voice_params();

        info!(
            request_id = %request_id,
            mode = %mode,
            text_length = summary.text_length,
            units = units.len(),
            deadline_secs = deadline.as_secs(),
            "Generation session started"
        );

        let mut reassembler = Reassembler::new(units.len(), self.failure_policy);
        for unit in units {
            let index = unit.index();
            let backend = Arc::clone(&self.backend);
            let params = params.clone();
            let retry = self.retry;
            let tx = tx.clone();

            let task = DispatchTask::new(
                unit.task_id(),
                index,
                move || async move {
                    synthesize_with_retry(backend.as_ref(), &unit, &params, retry).await
                },
                move |completion: TaskCompletion| {
                    // The receiver is gone once the session ended; nothing to do.
                    let _ = tx.send(CompletionRecord {
                        index,
                        outcome: completion.result,
                    });
                },
            )
            .with_cancellation(cancel.clone());

            if let Err(err) = self.queue.try_submit(task) {
                cancel.cancel();
                let err = SynthesisError::from(err);
                warn!(
                    request_id = %request_id,
                    index,
                    error = %err,
                    "Session rejected by dispatch queue"
                );
                self.log.record(summary.to_record(
                    started.elapsed(),
                    0,
                    GenerationStatus::Error,
                    Some(err.to_string()),
                ));
                return Err(err);
            }
        }
        reassembler.submission_finished();

        let session = StreamSession::new(
            request_id,
            reassembler,
            summary,
            deadline,
            cancel,
            Arc::clone(&self.log),
        );
        Ok(session.into_stream(rx))
    }
}
