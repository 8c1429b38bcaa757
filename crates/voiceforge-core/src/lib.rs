#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod error;
pub mod policy;
pub mod ports;
pub mod segment;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{Settings, SettingsError};
pub use domain::{
    AudioFormat, GenerationMode, GenerationRecord, GenerationStatus, MAX_INPUT_CHARS,
    SUPPORTED_MODELS, SpeechRequest, SynthesisUnit, VoiceParams, index_from_task_id, task_id_for,
};
pub use error::SynthesisError;
pub use policy::{
    FailurePolicy, RetryPolicy, UNIT_REQUEST_TIMEOUT, timeout_for, timeout_secs_for,
};
pub use ports::{GenerationLog, InMemoryGenerationLog, SpeechBackend, TracingGenerationLog};
pub use segment::{Segmenter, SegmenterConfig, segment};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
