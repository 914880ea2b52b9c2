use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use correlator_query::CorrelationQueryEngine;
use serde_json::json;
use uuid::Uuid;

use crate::dto::HealthResponse;
use crate::error::{ApiError, ApiErrorContext};
use crate::state::AppState;

const CORRELATION_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn health() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

pub async fn ping() -> Response {
    (StatusCode::OK, "pong").into_response()
}

/// Bounded by a 2-second hard deadline (spec §5); `store.health_check()` is
/// a blocking call, so it runs on the blocking pool rather than inline.
pub async fn ready(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    let check = tokio::task::spawn_blocking(move || store.health_check());

    match tokio::time::timeout(CORRELATION_HEALTH_CHECK_TIMEOUT, check).await {
        Ok(Ok(Ok(()))) => (StatusCode::OK, Json(json!({"status": "ready"}))).into_response(),
        Ok(Ok(Err(e))) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready", "reason": e.to_string()}))).into_response(),
        Ok(Err(join_err)) => {
            log::error!("health check task panicked: {join_err}");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready", "reason": "health check failed"}))).into_response()
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready", "reason": "health check timed out"}))).into_response(),
    }
}

pub async fn correlation_health(State(state): State<AppState>) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let ctx = || ApiErrorContext { instance: "/api/v1/health/correlation".into(), correlation_id: correlation_id.clone() };

    let engine = CorrelationQueryEngine::new(&*state.reader);
    let health = match engine.query_correlation_health() {
        Ok(h) => h,
        Err(e) => return ApiError::from(e).into_response_with(ctx()),
    };
    let orphans = match engine.query_orphan_datasets() {
        Ok(o) => o,
        Err(e) => return ApiError::from(e).into_response_with(ctx()),
    };
    let patterns = match engine.query_suggested_patterns() {
        Ok(p) => p,
        Err(e) => return ApiError::from(e).into_response_with(ctx()),
    };
    let produced_datasets = match state.reader.dataset_urns_with_output_edge() {
        Ok(v) => v.len() as i64,
        Err(e) => return ApiError::from(e).into_response_with(ctx()),
    };

    Json(HealthResponse::assemble(health, produced_datasets, &orphans, &patterns)).into_response()
}
