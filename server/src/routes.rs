use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tts_core::{SynthesisRequest, VoicePreset};

use crate::error::ApiError;
use crate::metrics::{MetricsResponse, SystemMetrics};
use crate::validation::validate_tts_text;
use crate::AppState;

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
const AUDIO_CACHE_CONTROL: &str = "public, max-age=86400";
const REQUEST_ID_HEADER: &str = "x-request-id";
const CACHE_STATUS_HEADER: &str = "x-cache";

/// Fields accepted by `GET /tts` (query string) and `POST /tts` (JSON body).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TtsParams {
    pub text: Option<String>,
    pub lang: Option<String>,
    pub preset: Option<String>,
    pub rate: Option<String>,
    pub pitch: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: String,
    pub presets: Vec<String>,
}

#[derive(Serialize)]
pub struct VoicesResponse<'a> {
    pub voices: BTreeMap<&'a str, &'a VoicePreset>,
}

/// Build the application router with CORS and request-id handling.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check).fallback(not_found))
        .route("/voices", get(list_voices).fallback(not_found))
        .route("/tts", get(tts_query).post(tts_json).fallback(not_found))
        .route("/metrics", get(metrics_endpoint).fallback(not_found))
        .fallback(not_found)
        .layer(middleware::from_fn(cors_headers))
        .layer(middleware::from_fn(add_request_id))
        .with_state(state)
}

/// Answers preflight for any path and stamps CORS headers on every response.
pub async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

// Request ID middleware for tracing
pub async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(request).await;
    };

    request.headers_mut().insert(header_name.clone(), value.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert(header_name, value);
    response
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.dispatcher.engine_name().to_string();
    let status = if engine == tts_core::engine::DISABLED_ENGINE {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        engine,
        presets: state.presets().ids(),
    })
}

pub async fn list_voices(State(state): State<AppState>) -> Response {
    let voices = state
        .presets()
        .iter()
        .map(|preset| (preset.id.as_str(), preset))
        .collect();
    Json(VoicesResponse { voices }).into_response()
}

pub async fn tts_query(
    State(state): State<AppState>,
    params: Result<Query<TtsParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    synthesize_response(&state, params).await
}

pub async fn tts_json(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let params: TtsParams = serde_json::from_slice(&body)
        .map_err(|_| ApiError::InvalidInput("Invalid JSON".to_string()))?;
    synthesize_response(&state, params).await
}

async fn synthesize_response(state: &AppState, params: TtsParams) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let start = Instant::now();

    let result = synthesize(state, params).await;

    let endpoint = &state.metrics.tts;
    endpoint.record_request(start.elapsed().as_millis() as u64);
    if result.is_err() {
        endpoint.record_error();
    }
    result
}

async fn synthesize(state: &AppState, params: TtsParams) -> Result<Response, ApiError> {
    let text = validate_tts_text(params.text.as_deref())?;

    let request = SynthesisRequest {
        text: text.to_string(),
        lang: params.lang,
        preset: params.preset,
        rate: params.rate,
        pitch: params.pitch,
    };

    let outcome = match state.dispatcher.synthesize_and_cache(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.metrics.synthesis.record_failure();
            return Err(e.into());
        }
    };

    state.metrics.synthesis.record_outcome(
        outcome.cache_hit,
        outcome.elapsed.as_millis() as u64,
        outcome.audio.len(),
    );
    debug!(
        "Serving {} bytes for preset {} ({})",
        outcome.audio.len(),
        outcome.preset_id,
        if outcome.cache_hit { "hit" } else { "miss" }
    );

    let content_length = outcome.audio.len();
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::CACHE_CONTROL, AUDIO_CACHE_CONTROL)
        .header(CACHE_STATUS_HEADER, if outcome.cache_hit { "HIT" } else { "MISS" })
        .body(Body::from(outcome.audio))
        .map_err(|e| ApiError::InternalError(format!("Failed to build audio response: {e}")))
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    Json(MetricsResponse {
        timestamp: chrono::Utc::now(),
        engine: state.dispatcher.engine_name().to_string(),
        system: SystemMetrics {
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_used_mb: system.used_memory() / 1024 / 1024,
            memory_total_mb: system.total_memory() / 1024 / 1024,
            request_count: state.request_count.load(Ordering::Relaxed),
            uptime_seconds: state.started_at.elapsed().as_secs(),
        },
        tts: state.metrics.tts.stats(),
        synthesis: state.metrics.synthesis.stats(),
    })
}
