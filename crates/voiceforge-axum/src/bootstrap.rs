//! Composition root.
//!
//! Builds the dispatch queue, the backend client and the speech service
//! from [`Settings`], and runs the HTTP server with graceful shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use voiceforge_backend::{BackendConfig, HttpSpeechBackend};
use voiceforge_core::{
    GenerationLog, InMemoryGenerationLog, Segmenter, SegmenterConfig, Settings, SpeechBackend,
};
use voiceforge_dispatch::{DispatchConfig, DispatchQueue, SpeechService};

use crate::routes::create_router;
use crate::state::{AppContext, AppState};

/// Build the application state around an already constructed backend.
///
/// Starts the dispatch queue, so this must run inside a tokio runtime.
pub fn build_state(settings: Settings, backend: Arc<dyn SpeechBackend>) -> Result<AppState> {
    let queue = Arc::new(DispatchQueue::new(
        DispatchConfig::default()
            .with_workers(settings.queue_workers)
            .with_capacity(settings.queue_capacity),
    ));
    queue.start().context("failed to start dispatch queue")?;

    let log: Arc<dyn GenerationLog> = Arc::new(InMemoryGenerationLog::default());
    let segmenter =
        Segmenter::new(SegmenterConfig::default().with_max_unit_chars(settings.max_unit_chars));

    let service = SpeechService::new(queue, backend, log)
        .with_segmenter(segmenter)
        .with_failure_policy(settings.failure_policy);

    Ok(Arc::new(AppContext { service, settings }))
}

/// Build the production state: HTTP backend configured from `settings`.
pub fn bootstrap(settings: Settings) -> Result<AppState> {
    let backend = HttpSpeechBackend::new(BackendConfig::from_settings(&settings))
        .context("failed to create speech backend")?;
    info!(
        upstream = %backend.speech_url(),
        workers = settings.queue_workers,
        max_unit_chars = settings.max_unit_chars,
        failure_policy = %settings.failure_policy,
        "Speech backend configured"
    );
    build_state(settings, Arc::new(backend))
}

/// Serve until ctrl-c, then stop the dispatch queue.
pub async fn start_server(settings: Settings) -> Result<()> {
    let addr = settings.bind_address();
    let state = bootstrap(settings)?;
    let app = create_router(Arc::clone(&state));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("VoiceForge listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down dispatch queue");
    if let Err(e) = state.service.queue().stop().await {
        warn!(error = %e, "Dispatch queue did not stop cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c; shutting down");
    }
}
