//! Queue and generation statistics.

use axum::Json;
use axum::extract::{Query, State};
use voiceforge_core::GenerationRecord;
use voiceforge_dispatch::QueueStatus;

use crate::dto::RecentQuery;
use crate::state::AppState;

const DEFAULT_RECENT: usize = 20;
const MAX_RECENT: usize = 200;

/// `GET /api/queue/status`
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.service.queue().status())
}

/// `GET /api/stats/recent`
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<GenerationRecord>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT).min(MAX_RECENT);
    Json(state.service.generation_log().recent(limit))
}
