//! Read-side shapes returned by the [`crate::engine::CorrelationQueryEngine`]
//! and the [`crate::orphan`] detector. None of these are persisted; they are
//! assembled on demand from [`correlator_core::LineageReader`] projections.

use chrono::{DateTime, Utc};
use correlator_domain::{JobRun, TestResult};

/// Per spec §4.7: `unknown` strictly dominates `orphan`, which dominates
/// `correlated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationStatus {
    Unknown,
    Orphan,
    Correlated,
}

/// A failing (or otherwise reported) test result joined to its producing job
/// run, with the job's own status backfilled from its parent orchestration
/// run when the job never emitted a terminal event itself.
#[derive(Debug, Clone)]
pub struct Incident {
    pub id: i64,
    pub test_result: TestResult,
    pub job_run: Option<JobRun>,
    pub status: CorrelationStatus,
}

#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub executed_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Clamps to spec §4.7's `limit in [1, 100]`, `offset >= 0`.
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit: limit.clamp(1, 100), offset: offset.max(0) }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

/// One hop of a downstream walk (spec §4.7): `parent_urn` is the dataset
/// whose consumption produced this one, `None` at the first hop out of the
/// incident's run.
#[derive(Debug, Clone)]
pub struct DownstreamResult {
    pub dataset_urn: String,
    pub name: String,
    pub depth: u32,
    pub parent_urn: Option<String>,
    pub producer: String,
}

/// One hop of an upstream walk: `child_urn` is the dataset this hop feeds,
/// symmetric to `DownstreamResult::parent_urn`.
#[derive(Debug, Clone)]
pub struct UpstreamResult {
    pub dataset_urn: String,
    pub name: String,
    pub depth: u32,
    pub child_urn: Option<String>,
    pub producer: String,
}

/// A dataset seen in test results but never produced by any recorded run.
#[derive(Debug, Clone)]
pub struct OrphanDataset {
    pub dataset_urn: String,
    pub name: String,
    pub suggested_match: Option<SuggestedMatch>,
}

#[derive(Debug, Clone)]
pub struct SuggestedMatch {
    pub canonical_urn: String,
    pub match_reason: MatchReason,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    ExactTableName,
    FuzzyStructural,
}

/// A reconciliation suggestion grouping orphans that share a canonical
/// match by the portion of the URN that differed (spec §4.8).
#[derive(Debug, Clone)]
pub struct SuggestedPattern {
    pub pattern: String,
    pub canonical: String,
    pub resolves_count: usize,
    pub orphans_resolved: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Health {
    pub total_datasets: i64,
    pub correlated_datasets: i64,
    pub correlation_rate: f64,
}

impl Health {
    pub fn compute(total_datasets: i64, correlated_datasets: i64) -> Self {
        let correlation_rate = if total_datasets == 0 { 1.0 } else { correlated_datasets as f64 / total_datasets as f64 };
        Self { total_datasets, correlated_datasets, correlation_rate }
    }
}
