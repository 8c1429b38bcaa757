//! Domain types for speech generation.

pub mod record;
pub mod request;
pub mod unit;

pub use record::{GenerationRecord, GenerationStatus};
pub use request::{
    AudioFormat, GenerationMode, MAX_INPUT_CHARS, SUPPORTED_MODELS, SpeechRequest, VoiceParams,
};
pub use unit::{SynthesisUnit, index_from_task_id, task_id_for};
