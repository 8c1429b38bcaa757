//! `POST /v1/audio/speech`

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::dto::SpeechBody;
use crate::error::HttpError;
use crate::handlers::bearer_token;
use crate::state::AppState;

pub const GENERATION_DURATION_HEADER: &str = "x-generation-duration";
pub const AUDIO_SIZE_HEADER: &str = "x-audio-size";

/// Generate speech, streamed or as one buffer depending on `stream`.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SpeechBody>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(body) = body?;
    let api_key = state.api_key_or_default(bearer_token(&headers));
    let request = body.into_request(&state.settings, api_key);
    let format = request.response_format;

    info!(
        mode = %request.mode(),
        text_length = request.text_length(),
        voice = %request.voice,
        format = %format,
        "Speech request"
    );

    if request.stream {
        let stream = state.service.stream(&request)?;
        let headers = [
            (CONTENT_TYPE, format.content_type()),
            (CACHE_CONTROL, "no-cache"),
        ];
        return Ok((headers, Body::from_stream(stream)).into_response());
    }

    let generated = state.service.generate(&request).await?;
    let headers = [
        (CONTENT_TYPE.as_str(), format.content_type().to_string()),
        (
            CONTENT_DISPOSITION.as_str(),
            format!("attachment; filename=\"speech.{format}\""),
        ),
        (
            GENERATION_DURATION_HEADER,
            format!("{:.2}", generated.duration.as_secs_f64()),
        ),
        (AUDIO_SIZE_HEADER, generated.size().to_string()),
    ];
    Ok((headers, generated.audio).into_response())
}
