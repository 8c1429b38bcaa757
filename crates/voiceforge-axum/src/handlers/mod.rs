//! HTTP request handlers.
//!
//! Handlers are thin wrappers: each parses its input, calls the
//! `SpeechService` (or the backend behind it) once and shapes the result.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

pub mod health;
pub mod models;
pub mod speech;
pub mod stats;

/// Token from an `Authorization: Bearer <token>` header, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer ")))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
