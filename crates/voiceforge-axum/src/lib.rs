#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tower as _;

use tracing_subscriber as _; // Used by main.rs binary

pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use bootstrap::{bootstrap, build_state, start_server};
pub use error::HttpError;
pub use routes::create_router;
pub use state::{AppContext, AppState};
