//! Request and response bodies of the HTTP surface.

use serde::{Deserialize, Serialize};
use voiceforge_core::{AudioFormat, Settings, SpeechRequest};

/// Body of `POST /v1/audio/speech`. Omitted fields use the configured defaults.
#[derive(Debug, Deserialize)]
pub struct SpeechBody {
    pub input: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response_format: Option<AudioFormat>,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub stream: bool,
}

impl SpeechBody {
    pub fn into_request(self, settings: &Settings, api_key: String) -> SpeechRequest {
        SpeechRequest {
            input: self.input,
            voice: self.voice.unwrap_or_else(|| settings.default_voice.clone()),
            model: self.model.unwrap_or_else(|| settings.default_model.clone()),
            response_format: self.response_format.unwrap_or(settings.default_format),
            speed: self.speed.unwrap_or(settings.default_speed),
            api_key,
            stream: self.stream,
        }
    }
}

/// Body of `POST /api/test-connection`.
#[derive(Debug, Default, Deserialize)]
pub struct TestConnectionBody {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Result of a connection probe. Failures are reported in-band.
#[derive(Debug, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<serde_json::Value>,
}

/// Query of `GET /api/stats/recent`.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_settings_defaults() {
        let body: SpeechBody = serde_json::from_str(r#"{"input": "Hello."}"#).unwrap();
        let settings = Settings::default();
        let request = body.into_request(&settings, "key".to_string());

        assert_eq!(request.voice, settings.default_voice);
        assert_eq!(request.model, "tts-1");
        assert_eq!(request.response_format, AudioFormat::Mp3);
        assert!((request.speed - 1.0).abs() < f32::EPSILON);
        assert!(!request.stream);
        assert_eq!(request.api_key, "key");
    }

    #[test]
    fn explicit_fields_win() {
        let body: SpeechBody = serde_json::from_str(
            r#"{"input": "Hi.", "voice": "alloy", "response_format": "wav", "speed": 2.0, "stream": true}"#,
        )
        .unwrap();
        let request = body.into_request(&Settings::default(), String::new());

        assert_eq!(request.voice, "alloy");
        assert_eq!(request.response_format, AudioFormat::Wav);
        assert!(request.stream);
    }
}
