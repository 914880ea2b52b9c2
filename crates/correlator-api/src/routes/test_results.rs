use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use correlator_core::ingest_test_result_batch;
use uuid::Uuid;

use super::lineage::{batch_status_code, is_json_content_type, map_batch_error};
use crate::dto::BatchResponseBody;
use crate::error::{ApiError, ApiErrorContext};
use crate::state::AppState;

const INSTANCE: &str = "/api/v1/test-results";

pub async fn ingest_test_results(State(state): State<AppState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let ctx = || ApiErrorContext { instance: INSTANCE.into(), correlation_id: correlation_id.clone() };

    if !is_json_content_type(&headers) {
        return ApiError::UnsupportedMediaType.into_response_with(ctx());
    }

    match ingest_test_result_batch(&state.test_store, &body, state.config.max_request_size) {
        Ok((outcomes, summary)) => {
            let status = batch_status_code(summary.failed, summary.successful);
            let body = BatchResponseBody::from_outcomes(&outcomes, summary, correlation_id);
            (status, Json(body)).into_response()
        }
        Err(err) => map_batch_error(err).into_response_with(ctx()),
    }
}
