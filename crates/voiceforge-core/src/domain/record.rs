//! Generation records handed to the statistics layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::{AudioFormat, GenerationMode};

/// Outcome of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Success,
    Error,
}

/// One row per completed (or failed) generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub timestamp: DateTime<Utc>,
    pub text_length: usize,
    pub voice: String,
    pub format: AudioFormat,
    pub speed: f32,
    pub mode: GenerationMode,
    pub duration_seconds: f64,
    pub audio_size_bytes: u64,
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl GenerationRecord {
    /// Whether the generation produced usable audio.
    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }
}
