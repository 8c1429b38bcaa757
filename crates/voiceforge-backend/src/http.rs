//! reqwest implementation of the [`SpeechBackend`] port.
//!
//! Transient failures (429 and the usual 5xx gateway statuses, plus
//! connection errors) are retried here with exponential backoff. This is a
//! fast layer beneath the dispatcher's per-unit retry policy.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;
use voiceforge_core::{AudioFormat, SpeechBackend, SynthesisError, SynthesisUnit, VoiceParams};

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult, friendly_message};

/// JSON body of a synthesis call.
#[derive(Debug, Serialize)]
struct SpeechPayload<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: AudioFormat,
    speed: f32,
}

/// Production backend talking to an OpenAI-compatible speech endpoint.
pub struct HttpSpeechBackend {
    client: reqwest::Client,
    config: BackendConfig,
    speech_url: Url,
    models_url: Url,
}

impl HttpSpeechBackend {
    /// Create a backend. Fails when the configured URLs do not parse.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        let speech_url = Url::parse(&format!("{}{}", config.base_url, config.endpoint))?;
        let models_url = Url::parse(&format!("{}{}", config.base_url, config.models_endpoint))?;

        Ok(Self {
            client,
            config,
            speech_url,
            models_url,
        })
    }

    /// Endpoint used for synthesis calls.
    pub const fn speech_url(&self) -> &Url {
        &self.speech_url
    }

    /// Per-call key wins over the configured token.
    fn bearer<'a>(&'a self, call_key: Option<&'a str>) -> Option<&'a str> {
        call_key
            .filter(|key| !key.trim().is_empty())
            .or(self.config.token.as_deref())
    }

    /// Send a request, retrying transient failures.
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is
    /// consumed by `send`.
    async fn send_with_retry<F>(&self, url: &Url, build: F) -> BackendResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut retry = 0u8;
        loop {
            let err = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => status_error(response).await,
                Err(e) => BackendError::from_transport(e),
            };

            if retry >= self.config.max_retries || !err.is_transient() {
                return Err(err);
            }

            retry += 1;
            let delay = self.config.backoff(retry);
            warn!(
                url = %url,
                retry,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Transient backend failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Turn a failed response into a [`BackendError::Status`] with a friendly message.
async fn status_error(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BackendError::Status {
        status,
        message: friendly_message(status, &body),
    }
}

#[async_trait]
impl SpeechBackend for HttpSpeechBackend {
    async fn synthesize(
        &self,
        unit: &SynthesisUnit,
        params: &VoiceParams,
    ) -> Result<Bytes, SynthesisError> {
        let payload = SpeechPayload {
            model: &params.model,
            input: unit.text(),
            voice: &params.voice,
            response_format: params.format,
            speed: params.speed,
        };
        let token = self.bearer(Some(params.api_key.as_str()));
        let started = Instant::now();

        let response = self
            .send_with_retry(&self.speech_url, || {
                let request = self.client.post(self.speech_url.as_str()).json(&payload);
                match token {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;

        let audio = response.bytes().await.map_err(BackendError::from_transport)?;
        if audio.is_empty() {
            return Err(BackendError::InvalidResponse {
                message: "backend returned an empty audio body".to_string(),
            }
            .into());
        }

        debug!(
            task_id = %unit.task_id(),
            chars = unit.length(),
            bytes = audio.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Unit synthesized"
        );
        Ok(audio)
    }

    async fn list_models(&self, api_key: Option<&str>) -> Result<serde_json::Value, SynthesisError> {
        let token = self.bearer(api_key);

        let response = self
            .send_with_retry(&self.models_url, || {
                let request = self
                    .client
                    .get(self.models_url.as_str())
                    .timeout(self.config.models_timeout);
                match token {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;

        let models = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                message: e.to_string(),
            })?;
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_joined() {
        let backend = HttpSpeechBackend::new(
            BackendConfig::new()
                .with_base_url("http://tts.local:5050/")
                .with_endpoint("/v1/audio/speech"),
        )
        .unwrap();
        assert_eq!(
            backend.speech_url().as_str(),
            "http://tts.local:5050/v1/audio/speech"
        );
        assert_eq!(backend.models_url.as_str(), "http://tts.local:5050/models");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpSpeechBackend::new(BackendConfig::new().with_base_url("not a url"));
        assert!(matches!(result, Err(BackendError::InvalidUrl(_))));
    }

    #[test]
    fn test_call_key_wins_over_configured_token() {
        let backend = HttpSpeechBackend::new(BackendConfig::new().with_token("fallback")).unwrap();
        assert_eq!(backend.bearer(Some("caller")), Some("caller"));
        assert_eq!(backend.bearer(Some("  ")), Some("fallback"));
        assert_eq!(backend.bearer(None), Some("fallback"));

        let backend = HttpSpeechBackend::new(BackendConfig::new()).unwrap();
        assert_eq!(backend.bearer(None), None);
    }

    #[test]
    fn test_payload_shape() {
        let payload = SpeechPayload {
            model: "tts-1",
            input: "Hello.",
            voice: "alloy",
            response_format: AudioFormat::Opus,
            speed: 1.5,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "tts-1",
                "input": "Hello.",
                "voice": "alloy",
                "response_format": "opus",
                "speed": 1.5
            })
        );
    }
}
