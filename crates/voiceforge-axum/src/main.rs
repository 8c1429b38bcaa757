//! VoiceForge server binary.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use voiceforge_core::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    voiceforge_axum::start_server(settings).await
}
