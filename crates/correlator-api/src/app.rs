//! Router assembly. Auth/rate-limiting middleware are named in spec §6 as
//! out-of-scope collaborators; this is where they would attach, as an
//! additional `.layer(...)` between the CORS and tracing layers below.

use axum::routing::{get, post};
use axum::Router;
use correlator_config::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::routes::{health, incidents, lineage, test_results};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let max_request_size = state.config.max_request_size;
    let cors = build_cors_layer(&state.config);

    Router::new()
        .route("/api/v1/lineage/events", post(lineage::ingest_lineage_events))
        .route("/api/v1/test-results", post(test_results::ingest_test_results))
        .route("/api/v1/incidents", get(incidents::list_incidents))
        .route("/api/v1/incidents/:id", get(incidents::get_incident))
        .route("/api/v1/health/correlation", get(health::correlation_health))
        .route("/health", get(health::health))
        .route("/ping", get(health::ping))
        .route("/ready", get(health::ready))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<_> = config.cors_allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}
