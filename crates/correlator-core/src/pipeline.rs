//! The batch ingestion pipeline (spec §4.4) — the hard path. Maps wire events
//! to domain records, validates, stores, and reports, stage by stage.

use std::collections::HashSet;

use correlator_domain::RunEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CoreError, SequenceError, ValidationError};
use crate::lifecycle::validate_event_sequence;
use crate::store::{LineageStore, StoreOutcome};
use crate::validator::validate_run_event;
use crate::wire::map_wire_event;

/// Stage-1 (size/shape gate) and stage-3 (sequence) failures. Both fail the
/// whole batch rather than reporting a per-event outcome.
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    #[error("request body exceeds the configured maximum size")]
    PayloadTooLarge,
    #[error("request body is empty")]
    EmptyBody,
    #[error("malformed JSON: {0}")]
    MalformedJson(String),
    #[error("batch must be a non-empty JSON array")]
    EmptyArray,
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    /// The store reported a total outage (e.g. the connection pool itself
    /// could not be checked out) rather than a per-event failure — the whole
    /// batch fails instead of reporting every item `StorageFailed` (spec §6).
    #[error("storage unavailable: {0}")]
    Internal(String),
}

/// The positional, per-event outcome of one batch element (spec §4.4 stage 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum IngestOutcome {
    Stored,
    /// An idempotent replay — counted as successful, not failed.
    Duplicate,
    ValidationFailed { reason: String, non_retriable: bool },
    StorageFailed { reason: String, retriable: bool },
}

impl IngestOutcome {
    fn is_successful(&self) -> bool {
        matches!(self, IngestOutcome::Stored | IngestOutcome::Duplicate)
    }

    fn is_retriable(&self) -> bool {
        matches!(self, IngestOutcome::StorageFailed { retriable: true, .. })
    }

    fn is_non_retriable_failure(&self) -> bool {
        matches!(self, IngestOutcome::ValidationFailed { .. })
            || matches!(self, IngestOutcome::StorageFailed { retriable: false, .. })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub received: usize,
    pub successful: usize,
    pub failed: usize,
    pub retriable: usize,
    pub non_retriable: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    /// Positionally aligned with the input batch array.
    pub outcomes: Vec<IngestOutcome>,
    pub summary: BatchSummary,
}

pub(crate) fn summarize_outcomes(outcomes: &[IngestOutcome]) -> BatchSummary {
    let mut summary = BatchSummary { received: outcomes.len(), ..Default::default() };
    for outcome in outcomes {
        if outcome.is_successful() {
            summary.successful += 1;
        } else {
            summary.failed += 1;
            if outcome.is_retriable() {
                summary.retriable += 1;
            }
            if outcome.is_non_retriable_failure() {
                summary.non_retriable += 1;
            }
        }
    }
    summary
}

/// Runs the full ingestion pipeline over one batch.
///
/// `store` is only ever called once, with the filtered set of validated
/// events — the filter step exists to keep unvalidated records from ever
/// reaching storage, an invariant of the pipeline rather than an
/// optimization (spec §4.4 stage 5).
pub fn ingest_batch<S: LineageStore>(store: &S, raw_body: &[u8], max_body_size: usize) -> Result<IngestResult, BatchError> {
    if raw_body.is_empty() {
        return Err(BatchError::EmptyBody);
    }
    if raw_body.len() > max_body_size {
        return Err(BatchError::PayloadTooLarge);
    }
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(raw_body).map_err(|e| BatchError::MalformedJson(e.to_string()))?;
    if values.is_empty() {
        return Err(BatchError::EmptyArray);
    }

    let mut outcomes: Vec<Option<IngestOutcome>> = vec![None; values.len()];
    let mut mapped: Vec<(usize, RunEvent)> = Vec::with_capacity(values.len());

    for (idx, value) in values.iter().enumerate() {
        match map_wire_event(value) {
            Ok(event) => mapped.push((idx, event)),
            Err(e) => outcomes[idx] = Some(validation_failed(e)),
        }
    }

    if mapped.len() > 1 {
        let run_keys: HashSet<(String, String, String)> = mapped
            .iter()
            .map(|(_, e)| {
                let (ns, name, run_id) = e.run_key();
                (ns.to_string(), name.to_string(), run_id.to_string())
            })
            .collect();
        if run_keys.len() == 1 {
            let events_only: Vec<RunEvent> = mapped.iter().map(|(_, e)| e.clone()).collect();
            if let Err(seq_err) = validate_event_sequence(events_only) {
                return Err(BatchError::Sequence(seq_err));
            }
            // `validate_event_sequence` checked legality against the
            // event-time order, not arrival order — feed that same order
            // into validation/storage below, or a terminal event that
            // arrived early would be stored before its predecessors and
            // the store's own transition check would reject them.
            mapped.sort_by(|a, b| a.1.event_time.cmp(&b.1.event_time));
        }
    }

    let mut validated: Vec<(usize, RunEvent)> = Vec::with_capacity(mapped.len());
    for (idx, event) in mapped {
        match validate_run_event(&event) {
            Ok(()) => validated.push((idx, event)),
            Err(e) => outcomes[idx] = Some(validation_failed(e)),
        }
    }

    // Dense valid-set -> sparse batch-index back-vector (spec §9): O(1)
    // lookup from the store's positional results back to the batch slot.
    let back_index: Vec<usize> = validated.iter().map(|(idx, _)| *idx).collect();
    let events_to_store: Vec<RunEvent> = validated.into_iter().map(|(_, e)| e).collect();
    let store_results = store.store_events(&events_to_store);

    if let Some(reason) = find_internal_failure(&store_results) {
        return Err(BatchError::Internal(reason));
    }

    for (pos, result) in store_results.into_iter().enumerate() {
        let original_idx = back_index[pos];
        outcomes[original_idx] = Some(match result {
            Ok(StoreOutcome::Stored) => IngestOutcome::Stored,
            Ok(StoreOutcome::Duplicate) => IngestOutcome::Duplicate,
            Err(e) => IngestOutcome::StorageFailed { reason: e.to_string(), retriable: e.retriable() },
        });
    }

    let outcomes: Vec<IngestOutcome> =
        outcomes.into_iter().map(|o| o.expect("every batch position is assigned exactly one outcome")).collect();
    let summary = summarize_outcomes(&outcomes);
    Ok(IngestResult { outcomes, summary })
}

fn validation_failed(e: ValidationError) -> IngestOutcome {
    IngestOutcome::ValidationFailed { reason: format!("{}: {}", e.field, e.reason), non_retriable: true }
}

/// A pool/connection-level outage surfaces as `CoreError::Internal` on every
/// item the store attempted (it never got far enough to evaluate any one
/// event on its own merits) — detecting a single instance is enough to
/// escalate the whole batch rather than reporting per-item storage failures.
pub(crate) fn find_internal_failure(results: &[Result<StoreOutcome, CoreError>]) -> Option<String> {
    results.iter().find_map(|r| match r {
        Err(CoreError::Internal(reason)) => Some(reason.clone()),
        _ => None,
    })
}
