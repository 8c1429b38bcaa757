//! Speech backend port.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{SynthesisUnit, VoiceParams};
use crate::error::SynthesisError;

/// A remote (or local) engine that turns one unit of text into audio.
///
/// Implementations must be `Send + Sync`; workers share a single backend
/// behind an `Arc`. A call covers exactly one attempt, retries are layered
/// on top by the caller.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesize a single unit and return the encoded audio bytes.
    async fn synthesize(
        &self,
        unit: &SynthesisUnit,
        params: &VoiceParams,
    ) -> Result<Bytes, SynthesisError>;

    /// List the models exposed by the backend, as returned upstream.
    async fn list_models(&self, api_key: Option<&str>) -> Result<serde_json::Value, SynthesisError>;
}
