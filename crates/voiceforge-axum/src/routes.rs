//! Route definitions and router construction.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Routes under `/api`, without the prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/queue/status", get(handlers::stats::queue_status))
        .route("/stats/recent", get(handlers::stats::recent))
        .route("/models", get(handlers::models::list))
        .route("/test-connection", post(handlers::models::test_connection))
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/audio/speech", post(handlers::speech::create))
        .route("/health", get(handlers::health::health))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
