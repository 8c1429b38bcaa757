//! Shared application state type.

use std::sync::Arc;

use voiceforge_core::Settings;
use voiceforge_dispatch::SpeechService;

/// Everything a handler needs.
pub struct AppContext {
    pub service: SpeechService,
    pub settings: Settings,
}

impl AppContext {
    /// Request key, falling back to the configured default.
    pub fn api_key_or_default(&self, provided: Option<String>) -> String {
        provided
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_api_key.clone())
    }
}

/// Application state shared across all handlers.
pub type AppState = Arc<AppContext>;
