//! Process configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first when present;
//! variables already set in the environment take precedence.

use std::str::FromStr;

use thiserror::Error;

use crate::domain::AudioFormat;
use crate::policy::FailurePolicy;
use crate::segment::DEFAULT_MAX_UNIT_CHARS;

/// Errors produced while reading [`Settings`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be at least 1")]
    Zero { key: &'static str },
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Base URL of the synthesis backend, without a trailing slash.
    pub api_base_url: String,
    pub api_endpoint: String,
    pub models_endpoint: String,
    /// Used when a request carries no key of its own.
    pub default_api_key: String,
    pub default_model: String,
    pub default_voice: String,
    pub default_format: AudioFormat,
    pub default_speed: f32,
    pub log_level: String,
    pub queue_workers: usize,
    pub queue_capacity: usize,
    pub max_unit_chars: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_base_url: "http://127.0.0.1:5050".to_string(),
            api_endpoint: "/v1/audio/speech".to_string(),
            models_endpoint: "/models".to_string(),
            default_api_key: String::new(),
            default_model: "tts-1".to_string(),
            default_voice: "zh-CN-XiaoxiaoNeural".to_string(),
            default_format: AudioFormat::Mp3,
            default_speed: 1.0,
            log_level: "info".to_string(),
            queue_workers: 1,
            queue_capacity: 4096,
            max_unit_chars: DEFAULT_MAX_UNIT_CHARS,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl Settings {
    /// Load `.env` (if any) and read settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup, falling back to defaults
    /// for missing or blank keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let settings = Self {
            host: get("VOICEFORGE_HOST").unwrap_or(defaults.host),
            port: parse(&get, "VOICEFORGE_PORT")?.unwrap_or(defaults.port),
            api_base_url: get("API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            api_endpoint: get("API_ENDPOINT").unwrap_or(defaults.api_endpoint),
            models_endpoint: get("MODELS_ENDPOINT").unwrap_or(defaults.models_endpoint),
            default_api_key: get("DEFAULT_API_KEY").unwrap_or(defaults.default_api_key),
            default_model: get("DEFAULT_MODEL").unwrap_or(defaults.default_model),
            default_voice: get("DEFAULT_VOICE").unwrap_or(defaults.default_voice),
            default_format: parse(&get, "DEFAULT_FORMAT")?.unwrap_or(defaults.default_format),
            default_speed: parse(&get, "DEFAULT_SPEED")?.unwrap_or(defaults.default_speed),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            queue_workers: positive(parse(&get, "QUEUE_WORKERS")?, "QUEUE_WORKERS")?
                .unwrap_or(defaults.queue_workers),
            queue_capacity: positive(parse(&get, "QUEUE_CAPACITY")?, "QUEUE_CAPACITY")?
                .unwrap_or(defaults.queue_capacity),
            max_unit_chars: positive(parse(&get, "MAX_UNIT_CHARS")?, "MAX_UNIT_CHARS")?
                .unwrap_or(defaults.max_unit_chars),
            failure_policy: parse(&get, "FAILURE_POLICY")?.unwrap_or(defaults.failure_policy),
        };

        Ok(settings)
    }

    /// `host:port` for binding the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T, G>(get: &G, key: &'static str) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| SettingsError::Invalid { key, value })
        })
        .transpose()
}

const fn positive(
    value: Option<usize>,
    key: &'static str,
) -> Result<Option<usize>, SettingsError> {
    match value {
        Some(0) => Err(SettingsError::Zero { key }),
        other => Ok(other),
    }
}
