#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod error;
pub mod queue;
pub mod reassembly;
mod retry;
mod service;

pub use error::DispatchError;
pub use queue::{DispatchConfig, DispatchQueue, DispatchTask, QueueStatus, TaskCompletion};
pub use reassembly::session::{RequestSummary, SpeechStream, StreamSession};
pub use reassembly::{CompletionRecord, Reassembler, SessionState};
pub use retry::synthesize_with_retry;
pub use service::{GeneratedAudio, SpeechService};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
