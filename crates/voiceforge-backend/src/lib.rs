#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod config;
mod error;
mod http;

pub use config::BackendConfig;
pub use error::{BackendError, BackendResult, friendly_message};
pub use http::HttpSpeechBackend;

// Silence unused dev-dependency warnings
#[cfg(test)]
use axum as _;
#[cfg(test)]
use tokio_test as _;
