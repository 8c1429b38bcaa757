//! Port definitions (trait abstractions) for external systems.
//!
//! Ports describe what the dispatch and reassembly layers expect from
//! infrastructure. They use only domain types.

pub mod backend;
pub mod generation_log;

pub use backend::SpeechBackend;
pub use generation_log::{GenerationLog, InMemoryGenerationLog, TracingGenerationLog};
