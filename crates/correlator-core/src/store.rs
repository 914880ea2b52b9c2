//! The trait boundary the ingestion pipeline depends on. `correlator-store`
//! implements these against Postgres; `correlator-query` depends on the
//! separate read-only [`LineageReader`] so it never needs write access.
//!
//! The pipeline orchestrates but does not persist directly (spec §3,
//! "Ownership"): it only ever calls through this trait.

use correlator_domain::{JobRun, LineageEdge, TestResult};

use crate::error::CoreError;

/// One event's/result's storage outcome, prior to being folded into an
/// [`crate::pipeline::IngestOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// The event's idempotency key (or test result's natural key) already
    /// existed. An idempotent success, not a failure.
    Duplicate,
}

/// Write side of the Lineage Store (spec §4.6). Implementations MUST
/// preserve positional ordering: `store_events(events)[i]` is the outcome for
/// `events[i]`. A connection/pool-level outage — as opposed to a failure on
/// one event's own query — MUST be reported as `CoreError::Internal` so the
/// pipeline can escalate to a batch-level failure instead of marking every
/// item `StorageFailed`.
pub trait LineageStore: Send + Sync {
    fn store_events(&self, events: &[correlator_domain::RunEvent]) -> Vec<Result<StoreOutcome, CoreError>>;
    fn health_check(&self) -> Result<(), CoreError>;
}

/// Write side of the test-result ingestor's storage call (spec §4.5).
pub trait TestResultStore: Send + Sync {
    fn store_test_results(&self, results: &[TestResult]) -> Vec<Result<StoreOutcome, CoreError>>;
}

/// Read-only projections the correlation query engine depends on (spec
/// §4.7). Kept separate from the write traits above so
/// `correlator-query` never needs a `&mut` or write-capable handle.
pub trait LineageReader: Send + Sync {
    fn find_job_run(&self, job_run_id: &str) -> Result<Option<JobRun>, CoreError>;
    fn find_parent_job_run(&self, job_run_id: &str) -> Result<Option<JobRun>, CoreError>;
    fn outgoing_edges(&self, dataset_urn: &str) -> Result<Vec<LineageEdge>, CoreError>;
    fn incoming_edges(&self, dataset_urn: &str) -> Result<Vec<LineageEdge>, CoreError>;
    fn job_runs_for_dataset(&self, dataset_urn: &str, edge_type: correlator_domain::EdgeType) -> Result<Vec<JobRun>, CoreError>;
    /// Every edge a single job run participates in, either side. The lineage
    /// walk needs this to expand a run into the datasets it produced
    /// (`Output`) or consumed (`Input`) before hopping to the next run.
    fn edges_for_job_run(&self, job_run_id: &str) -> Result<Vec<LineageEdge>, CoreError>;
    fn all_dataset_urns(&self) -> Result<Vec<String>, CoreError>;
    fn dataset_urns_with_output_edge(&self) -> Result<Vec<String>, CoreError>;
    fn test_results(&self, executed_after: Option<chrono::DateTime<chrono::Utc>>, limit: i64, offset: i64) -> Result<(Vec<(i64, TestResult)>, i64), CoreError>;
    fn test_result_by_id(&self, id: i64) -> Result<Option<(i64, TestResult)>, CoreError>;
}

// Lets a trait object be handed to the generic pipeline functions (which
// take `S: LineageStore` / `S: TestResultStore`) without the caller
// (`correlator-api`) needing to know the concrete store type behind the
// `Arc`.
impl LineageStore for std::sync::Arc<dyn LineageStore> {
    fn store_events(&self, events: &[correlator_domain::RunEvent]) -> Vec<Result<StoreOutcome, CoreError>> {
        (**self).store_events(events)
    }

    fn health_check(&self) -> Result<(), CoreError> {
        (**self).health_check()
    }
}

impl TestResultStore for std::sync::Arc<dyn TestResultStore> {
    fn store_test_results(&self, results: &[TestResult]) -> Vec<Result<StoreOutcome, CoreError>> {
        (**self).store_test_results(results)
    }
}
