//! Upstream model listing and connection probe.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use tracing::warn;
use voiceforge_core::SynthesisError;

use crate::dto::{TestConnectionBody, TestConnectionResponse};
use crate::error::HttpError;
use crate::handlers::bearer_token;
use crate::state::AppState;

/// `GET /api/models`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, HttpError> {
    let api_key = state.api_key_or_default(bearer_token(&headers));
    let models = state
        .service
        .backend()
        .list_models(Some(api_key.as_str()))
        .await?;
    Ok(Json(models))
}

/// `POST /api/test-connection`
///
/// The key comes from the body, then the `Authorization` header, then the
/// configured default.
pub async fn test_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TestConnectionBody>, JsonRejection>,
) -> Result<Json<TestConnectionResponse>, HttpError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let api_key = state.api_key_or_default(body.api_key.or_else(|| bearer_token(&headers)));
    if api_key.trim().is_empty() {
        return Err(HttpError::BadRequest("API key must not be empty".to_string()));
    }

    let response = match state.service.backend().list_models(Some(api_key.as_str())).await {
        Ok(models) => TestConnectionResponse {
            success: true,
            message: "Connection successful".to_string(),
            models: Some(models),
        },
        Err(err) => {
            warn!(error = %err, "Connection test failed");
            let message = match err {
                SynthesisError::Timeout => "Connection timed out".to_string(),
                SynthesisError::Backend { message, .. } => format!("Connection failed: {message}"),
                other => format!("Connection failed: {other}"),
            };
            TestConnectionResponse {
                success: false,
                message,
                models: None,
            }
        }
    };
    Ok(Json(response))
}
