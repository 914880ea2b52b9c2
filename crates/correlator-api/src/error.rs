//! Transport-level error kinds (spec §7) and their RFC 7807
//! `application/problem+json` rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("unsupported media type, expected application/json")]
    UnsupportedMediaType,
    #[error("request body exceeds the configured maximum size")]
    PayloadTooLarge,
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "Invalid Request",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Forbidden => "Forbidden",
            ApiError::NotFound(_) => "Not Found",
            ApiError::UnsupportedMediaType => "Unsupported Media Type",
            ApiError::PayloadTooLarge => "Payload Too Large",
            ApiError::Unprocessable(_) => "Unprocessable Entity",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }

    /// Authentication failures get a generic detail message (anti-enumeration,
    /// spec §7); everything else surfaces its own cause.
    fn detail(&self) -> String {
        match self {
            ApiError::Unauthorized | ApiError::Forbidden => "authentication failed".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub correlation_id: String,
}

/// Carries the request path and a freshly minted correlation id into the
/// problem body; built by the handler right before returning an `ApiError`.
pub struct ApiErrorContext {
    pub instance: String,
    pub correlation_id: String,
}

impl ApiError {
    pub fn into_response_with(self, ctx: ApiErrorContext) -> Response {
        let status = self.status();
        log::warn!("request failed [correlation_id={}]: {self}", ctx.correlation_id);
        let body = ProblemDetails {
            problem_type: format!("https://correlator.dev/problems/{}", problem_slug(&self)),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: self.detail(),
            instance: ctx.instance,
            correlation_id: ctx.correlation_id,
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with(ApiErrorContext { instance: String::new(), correlation_id: uuid::Uuid::new_v4().to_string() })
    }
}

fn problem_slug(err: &ApiError) -> &'static str {
    match err {
        ApiError::InvalidRequest(_) => "invalid-request",
        ApiError::Unauthorized => "unauthorized",
        ApiError::Forbidden => "forbidden",
        ApiError::NotFound(_) => "not-found",
        ApiError::UnsupportedMediaType => "unsupported-media-type",
        ApiError::PayloadTooLarge => "payload-too-large",
        ApiError::Unprocessable(_) => "unprocessable",
        ApiError::Internal(_) => "internal",
    }
}

impl From<correlator_core::CoreError> for ApiError {
    fn from(e: correlator_core::CoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
