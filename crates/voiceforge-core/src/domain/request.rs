//! Speech request model, voice parameters and validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;

/// Longest accepted input, in characters.
pub const MAX_INPUT_CHARS: usize = 100_000;

/// Models accepted by the backend.
pub const SUPPORTED_MODELS: &[&str] = &["tts-1", "tts-1-hd"];

/// Accepted speed multiplier range.
const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.25..=4.0;

/// Audio container/codec requested from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl AudioFormat {
    /// Wire name of the format.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    /// MIME type used when returning audio of this format.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/opus",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Pcm => "audio/pcm",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "opus" => Ok(Self::Opus),
            "aac" => Ok(Self::Aac),
            "flac" => Ok(Self::Flac),
            "wav" => Ok(Self::Wav),
            "pcm" => Ok(Self::Pcm),
            other => Err(SynthesisError::Validation(format!(
                "unsupported audio format: {other}"
            ))),
        }
    }
}

/// Whole-response vs incremental delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Normal,
    Streaming,
}

impl GenerationMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Streaming => "streaming",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call parameters shared by every unit of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice: String,
    pub model: String,
    pub format: AudioFormat,
    pub speed: f32,
    /// Bearer token for the backend. Never serialized.
    #[serde(skip)]
    pub api_key: String,
}

/// A complete generation request as received from the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub input: String,
    pub voice: String,
    pub model: String,
    pub response_format: AudioFormat,
    pub speed: f32,
    #[serde(skip)]
    pub api_key: String,
    #[serde(default)]
    pub stream: bool,
}

impl SpeechRequest {
    /// Total input length in characters.
    pub fn text_length(&self) -> usize {
        self.input.chars().count()
    }

    /// Delivery mode selected by the caller.
    pub const fn mode(&self) -> GenerationMode {
        if self.stream {
            GenerationMode::Streaming
        } else {
            GenerationMode::Normal
        }
    }

    /// Parameters to attach to every unit call.
    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            voice: self.voice.clone(),
            model: self.model.clone(),
            format: self.response_format,
            speed: self.speed,
            api_key: self.api_key.clone(),
        }
    }

    /// Check the request, collecting every problem into one error.
    pub fn validate(&self) -> Result<(), SynthesisError> {
        let mut problems = Vec::new();

        let trimmed = self.input.trim();
        if trimmed.is_empty() {
            problems.push("input text must not be empty".to_string());
        } else if trimmed.chars().count() > MAX_INPUT_CHARS {
            problems.push(format!(
                "input text must not exceed {MAX_INPUT_CHARS} characters"
            ));
        }

        if self.voice.trim().is_empty() {
            problems.push("voice must not be empty".to_string());
        }

        if !SUPPORTED_MODELS.contains(&self.model.as_str()) {
            problems.push(format!("unsupported model: {}", self.model));
        }

        if !SPEED_RANGE.contains(&self.speed) {
            problems.push(format!(
                "speed must be between {}x and {}x, got {}",
                SPEED_RANGE.start(),
                SPEED_RANGE.end(),
                self.speed
            ));
        }

        if self.api_key.trim().is_empty() {
            problems.push("API key must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SynthesisError::Validation(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(input: &str) -> SpeechRequest {
        SpeechRequest {
            input: input.to_string(),
            voice: "zh-CN-XiaoxiaoNeural".to_string(),
            model: "tts-1".to_string(),
            response_format: AudioFormat::Mp3,
            speed: 1.0,
            api_key: "key".to_string(),
            stream: false,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request("Hello world.").validate().is_ok());
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = request("   \n").validate().unwrap_err();
        assert!(matches!(err, SynthesisError::Validation(msg) if msg.contains("empty")));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let text = "a".repeat(MAX_INPUT_CHARS + 1);
        assert!(request(&text).validate().is_err());

        let text = "a".repeat(MAX_INPUT_CHARS);
        assert!(request(&text).validate().is_ok());
    }

    #[test]
    fn all_problems_are_reported_together() {
        let mut req = request("");
        req.speed = 9.0;
        req.model = "whisper".to_string();
        req.api_key = String::new();

        let SynthesisError::Validation(msg) = req.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(msg.contains("empty"));
        assert!(msg.contains("speed"));
        assert!(msg.contains("whisper"));
        assert!(msg.contains("API key"));
    }

    #[test]
    fn mode_follows_stream_flag() {
        let mut req = request("hi");
        assert_eq!(req.mode(), GenerationMode::Normal);
        req.stream = true;
        assert_eq!(req.mode(), GenerationMode::Streaming);
        assert_eq!(req.mode().to_string(), "streaming");
    }

    #[test]
    fn audio_format_parsing() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!("flac".parse::<AudioFormat>().unwrap(), AudioFormat::Flac);
        assert!("ogg".parse::<AudioFormat>().is_err());
        assert_eq!(AudioFormat::Wav.content_type(), "audio/wav");
    }

    #[test]
    fn api_key_is_not_serialized() {
        let json = serde_json::to_string(&request("hi").voice_params()).unwrap();
        assert!(!json.contains("key"));
    }
}
