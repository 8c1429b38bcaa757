//! Application-level retry around a single unit call.

use bytes::Bytes;
use tracing::{debug, error, warn};
use voiceforge_core::{
    RetryPolicy, SpeechBackend, SynthesisError, SynthesisUnit, UNIT_REQUEST_TIMEOUT, VoiceParams,
};

/// Synthesize `unit`, retrying retryable failures per `policy`.
///
/// Each attempt is bounded by [`UNIT_REQUEST_TIMEOUT`]; an attempt that
/// overruns counts as [`SynthesisError::Timeout`]. Exhausting the attempts yields [`SynthesisError::UnitFailed`] carrying
/// the last underlying message. Non-retryable errors return immediately.
pub async fn synthesize_with_retry(
    backend: &dyn SpeechBackend,
    unit: &SynthesisUnit,
    params: &VoiceParams,
    policy: RetryPolicy,
) -> Result<Bytes, SynthesisError> {
    let index = unit.index();
    let mut attempt = 1;

    loop {
        debug!(index, attempt, length = unit.length(), "Synthesizing unit");
        let outcome = tokio::time::timeout(UNIT_REQUEST_TIMEOUT, backend.synthesize(unit, params))
            .await
            .unwrap_or(Err(SynthesisError::Timeout));
        let err = match outcome {
            Ok(audio) => {
                if attempt > 1 {
                    debug!(index, attempt, "Unit succeeded after retry");
                }
                return Ok(audio);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        match policy.delay_after(attempt) {
            Some(delay) => {
                warn!(
                    index,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Unit failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => {
                error!(index, attempts = attempt, error = %err, "Unit exhausted retries");
                return Err(SynthesisError::UnitFailed {
                    index,
                    attempts: attempt,
                    message: err.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;
    use voiceforge_core::testing::{ScriptedBackend, audio_for};
    use voiceforge_core::{AudioFormat, SynthesisUnit};

    fn params() -> VoiceParams {
        VoiceParams {
            voice: "alloy".into(),
            model: "tts-1".into(),
            format: AudioFormat::Mp3,
            speed: 1.0,
            api_key: "sk-test".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let backend = ScriptedBackend::new().fail_times(0, 2, SynthesisError::Timeout);
        let unit = SynthesisUnit::new(0, "hello");
        let start = Instant::now();

        let audio = synthesize_with_retry(&backend, &unit, &params(), RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(audio, audio_for(0));
        assert_eq!(backend.attempts(0), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_three_attempts() {
        let backend = ScriptedBackend::new().always_fail(1, SynthesisError::backend(503, "busy"));
        let unit = SynthesisUnit::new(1, "hello");
        let start = Instant::now();

        let err = synthesize_with_retry(&backend, &unit, &params(), RetryPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(backend.attempts(1), 3);
        // 2s after the first failure, 4s after the second, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        match err {
            SynthesisError::UnitFailed {
                index,
                attempts,
                message,
            } => {
                assert_eq!(index, 1);
                assert_eq!(attempts, 3);
                assert!(message.contains("busy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_attempts_time_out() {
        let backend = ScriptedBackend::new().with_delay(0, Duration::from_secs(120));
        let unit = SynthesisUnit::new(0, "hello");
        let start = Instant::now();

        let err = synthesize_with_retry(&backend, &unit, &params(), RetryPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(backend.attempts(0), 3);
        // Three 30 s attempts plus the 2 s and 4 s waits.
        assert_eq!(start.elapsed(), Duration::from_secs(96));
        match err {
            SynthesisError::UnitFailed { attempts, message, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(message, SynthesisError::Timeout.to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn final_errors_are_not_retried() {
        let backend = ScriptedBackend::new().always_fail(0, SynthesisError::Cancelled);
        let unit = SynthesisUnit::new(0, "hello");

        let err = synthesize_with_retry(&backend, &unit, &params(), RetryPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(err, SynthesisError::Cancelled);
        assert_eq!(backend.attempts(0), 1);
    }
}
