use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use correlator_query::{CorrelationQueryEngine, CorrelationStatus, IncidentFilter, Pagination};
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::{status_label, DownstreamDto, IncidentDetailResponse, IncidentsResponse, UpstreamDto};
use crate::error::{ApiError, ApiErrorContext};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IncidentsQuery {
    pub since: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_incidents(State(state): State<AppState>, Query(query): Query<IncidentsQuery>) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let ctx = || ApiErrorContext { instance: "/api/v1/incidents".into(), correlation_id: correlation_id.clone() };

    let executed_after = match query.since.as_deref().map(DateTime::parse_from_rfc3339) {
        None => None,
        Some(Ok(dt)) => Some(dt.with_timezone(&Utc)),
        Some(Err(_)) => return ApiError::InvalidRequest("since must be RFC3339".into()).into_response_with(ctx()),
    };
    if let Some(limit) = query.limit {
        if !(1..=100).contains(&limit) {
            return ApiError::InvalidRequest("limit must be in 1..=100".into()).into_response_with(ctx());
        }
    }
    if let Some(offset) = query.offset {
        if offset < 0 {
            return ApiError::InvalidRequest("offset must be >= 0".into()).into_response_with(ctx());
        }
    }

    let pagination = Pagination::new(query.limit.unwrap_or(20), query.offset.unwrap_or(0));
    let engine = CorrelationQueryEngine::new(&*state.reader);
    match engine.query_incidents(IncidentFilter { executed_after }, pagination) {
        Ok((incidents, total)) => {
            let orphan_count = incidents.iter().filter(|i| matches!(i.status, CorrelationStatus::Orphan)).count();
            let body = IncidentsResponse {
                incidents: incidents.iter().map(Into::into).collect(),
                total,
                limit: pagination.limit,
                offset: pagination.offset,
                orphan_count,
            };
            Json(body).into_response()
        }
        Err(e) => ApiError::from(e).into_response_with(ctx()),
    }
}

pub async fn get_incident(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let instance = format!("/api/v1/incidents/{raw_id}");
    let ctx = || ApiErrorContext { instance: instance.clone(), correlation_id: correlation_id.clone() };

    let id: i64 = match raw_id.parse() {
        Ok(v) => v,
        Err(_) => return ApiError::InvalidRequest("id must be numeric".into()).into_response_with(ctx()),
    };

    let engine = CorrelationQueryEngine::new(&*state.reader);
    let incident = match engine.query_incident_by_id(id) {
        Ok(Some(i)) => i,
        Ok(None) => return ApiError::NotFound(format!("incident {id} not found")).into_response_with(ctx()),
        Err(e) => return ApiError::from(e).into_response_with(ctx()),
    };

    let (upstream, downstream) = match incident.job_run.as_ref() {
        Some(run) => {
            let upstream = match engine.query_upstream_with_children(&incident.test_result.dataset_urn, None) {
                Ok(v) => v,
                Err(e) => return ApiError::from(e).into_response_with(ctx()),
            };
            let downstream = match engine.query_downstream_with_parents(&run.job_run_id, None) {
                Ok(v) => v,
                Err(e) => return ApiError::from(e).into_response_with(ctx()),
            };
            (upstream, downstream)
        }
        None => (Vec::new(), Vec::new()),
    };

    let body = IncidentDetailResponse {
        dataset_urn: incident.test_result.dataset_urn.clone(),
        test: (&incident.test_result).into(),
        job: incident.job_run.as_ref().map(Into::into),
        upstream: upstream.iter().map(Into::into).collect::<Vec<UpstreamDto>>(),
        downstream: downstream.iter().map(Into::into).collect::<Vec<DownstreamDto>>(),
        correlation_status: status_label(incident.status),
    };
    Json(body).into_response()
}
