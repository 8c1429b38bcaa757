//! End-to-end tests against an in-process HTTP server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use voiceforge_backend::{BackendConfig, HttpSpeechBackend};
use voiceforge_core::{AudioFormat, SpeechBackend, SynthesisError, SynthesisUnit, VoiceParams};

/// Scripted upstream: fails the first `fail_first` calls with `fail_status`.
#[derive(Clone)]
struct Upstream {
    calls: Arc<AtomicUsize>,
    fail_first: usize,
    fail_status: StatusCode,
    fail_body: &'static str,
    last_auth: Arc<std::sync::Mutex<Option<String>>>,
    last_body: Arc<std::sync::Mutex<Option<serde_json::Value>>>,
}

impl Upstream {
    fn new(fail_first: usize, fail_status: StatusCode) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first,
            fail_status,
            fail_body: "",
            last_auth: Arc::default(),
            last_body: Arc::default(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn speech(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let call = upstream.calls.fetch_add(1, Ordering::SeqCst);
    *upstream.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    *upstream.last_body.lock().unwrap() = Some(body.clone());

    if call < upstream.fail_first {
        return (upstream.fail_status, upstream.fail_body).into_response();
    }
    let input = body["input"].as_str().unwrap_or_default().to_string();
    (StatusCode::OK, format!("AUDIO[{input}]")).into_response()
}

async fn models() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "data": [{ "id": "tts-1" }, { "id": "tts-1-hd" }] }))
}

async fn serve(upstream: Upstream) -> String {
    let app = Router::new()
        .route("/v1/audio/speech", post(speech))
        .route("/models", get(models))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn backend(base_url: &str) -> HttpSpeechBackend {
    HttpSpeechBackend::new(
        BackendConfig::new()
            .with_base_url(base_url)
            .with_token("configured")
            .with_backoff_factor(Duration::from_millis(10)),
    )
    .unwrap()
}

fn params(api_key: &str) -> VoiceParams {
    VoiceParams {
        voice: "zh-CN-XiaoxiaoNeural".to_string(),
        model: "tts-1".to_string(),
        format: AudioFormat::Mp3,
        speed: 1.25,
        api_key: api_key.to_string(),
    }
}

#[tokio::test]
async fn synthesize_posts_unit_and_returns_body() {
    let upstream = Upstream::new(0, StatusCode::OK);
    let base = serve(upstream.clone()).await;

    let audio = backend(&base)
        .synthesize(&SynthesisUnit::new(0, "Hello there."), &params("caller-key"))
        .await
        .unwrap();

    assert_eq!(&audio[..], b"AUDIO[Hello there.]");
    assert_eq!(
        upstream.last_auth.lock().unwrap().as_deref(),
        Some("Bearer caller-key")
    );
    let body = upstream.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "tts-1");
    assert_eq!(body["voice"], "zh-CN-XiaoxiaoNeural");
    assert_eq!(body["response_format"], "mp3");
    assert_eq!(body["speed"], 1.25);
}

#[tokio::test]
async fn configured_token_is_used_without_call_key() {
    let upstream = Upstream::new(0, StatusCode::OK);
    let base = serve(upstream.clone()).await;

    backend(&base)
        .synthesize(&SynthesisUnit::new(0, "Hi."), &params(""))
        .await
        .unwrap();

    assert_eq!(
        upstream.last_auth.lock().unwrap().as_deref(),
        Some("Bearer configured")
    );
}

#[tokio::test]
async fn transient_statuses_are_retried() {
    let upstream = Upstream::new(2, StatusCode::SERVICE_UNAVAILABLE);
    let base = serve(upstream.clone()).await;

    let audio = backend(&base)
        .synthesize(&SynthesisUnit::new(3, "Again."), &params("k"))
        .await
        .unwrap();

    assert_eq!(&audio[..], b"AUDIO[Again.]");
    assert_eq!(upstream.calls(), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let upstream = Upstream::new(usize::MAX, StatusCode::TOO_MANY_REQUESTS);
    let base = serve(upstream.clone()).await;

    let err = backend(&base)
        .synthesize(&SynthesisUnit::new(0, "Busy."), &params("k"))
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::Backend { status: 429, .. }));
    assert_eq!(upstream.calls(), 3);
}

#[tokio::test]
async fn client_errors_fail_fast_with_friendly_message() {
    let upstream = Upstream::new(usize::MAX, StatusCode::UNAUTHORIZED);
    let base = serve(upstream.clone()).await;

    let err = backend(&base)
        .synthesize(&SynthesisUnit::new(0, "Who?"), &params("wrong"))
        .await
        .unwrap_err();

    assert_eq!(err, SynthesisError::backend(401, "Invalid API key"));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn unknown_status_uses_error_field() {
    let mut upstream = Upstream::new(usize::MAX, StatusCode::UNPROCESSABLE_ENTITY);
    upstream.fail_body = r#"{"error":"voice not found"}"#;
    let base = serve(upstream.clone()).await;

    let err = backend(&base)
        .synthesize(&SynthesisUnit::new(0, "Hm."), &params("k"))
        .await
        .unwrap_err();

    assert_eq!(err, SynthesisError::backend(422, "voice not found"));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    async fn stall() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }
    let app = Router::new().route("/v1/audio/speech", post(stall));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let backend = HttpSpeechBackend::new(
        BackendConfig::new()
            .with_base_url(format!("http://{addr}"))
            .with_request_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let err = backend
        .synthesize(&SynthesisUnit::new(0, "Slow."), &params("k"))
        .await
        .unwrap_err();
    assert_eq!(err, SynthesisError::Timeout);
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpSpeechBackend::new(
        BackendConfig::new()
            .with_base_url(format!("http://{addr}"))
            .with_max_retries(1)
            .with_backoff_factor(Duration::from_millis(5)),
    )
    .unwrap();

    let err = backend
        .synthesize(&SynthesisUnit::new(0, "Anyone?"), &params("k"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::Transport { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn list_models_returns_upstream_json() {
    let base = serve(Upstream::new(0, StatusCode::OK)).await;

    let models = backend(&base).list_models(None).await.unwrap();
    assert_eq!(models["data"][1]["id"], "tts-1-hd");
}
