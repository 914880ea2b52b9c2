use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use correlator_core::{ingest_batch, BatchError};
use uuid::Uuid;

use crate::dto::BatchResponseBody;
use crate::error::{ApiError, ApiErrorContext};
use crate::state::AppState;

const INSTANCE: &str = "/api/v1/lineage/events";

pub async fn ingest_lineage_events(State(state): State<AppState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let ctx = || ApiErrorContext { instance: INSTANCE.into(), correlation_id: correlation_id.clone() };

    if !is_json_content_type(&headers) {
        return ApiError::UnsupportedMediaType.into_response_with(ctx());
    }

    match ingest_batch(&state.store, &body, state.config.max_request_size) {
        Ok(result) => {
            let status = batch_status_code(result.summary.failed, result.summary.successful);
            let body = BatchResponseBody::from_outcomes(&result.outcomes, result.summary, correlation_id);
            (status, Json(body)).into_response()
        }
        Err(err) => map_batch_error(err).into_response_with(ctx()),
    }
}

pub(crate) fn batch_status_code(failed: usize, successful: usize) -> StatusCode {
    if failed == 0 {
        StatusCode::OK
    } else if successful > 0 {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

pub(crate) fn map_batch_error(err: BatchError) -> ApiError {
    match err {
        BatchError::PayloadTooLarge => ApiError::PayloadTooLarge,
        BatchError::EmptyBody | BatchError::EmptyArray | BatchError::MalformedJson(_) => ApiError::InvalidRequest(err.to_string()),
        BatchError::Sequence(_) => ApiError::Unprocessable(err.to_string()),
        BatchError::Internal(_) => ApiError::Internal(err.to_string()),
    }
}

pub(crate) fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
