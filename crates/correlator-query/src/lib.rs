//! correlator-query: the read-only correlation query layer (spec §4.7-§4.8).
//!
//! Depends only on `correlator_core::LineageReader` — it never touches a
//! write-capable store handle, so it can be exercised against an in-memory
//! fake in tests and a Postgres-backed reader in production with the same
//! code path.

pub mod engine;
pub mod model;
pub mod orphan;

pub use engine::CorrelationQueryEngine;
pub use model::{
    CorrelationStatus, DownstreamResult, Health, Incident, IncidentFilter, MatchReason, OrphanDataset, Pagination, SuggestedMatch,
    SuggestedPattern, UpstreamResult,
};
