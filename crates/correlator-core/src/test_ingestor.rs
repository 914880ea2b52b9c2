//! The test-result ingestion pipeline (spec §4.5). Same skeleton as
//! [`crate::pipeline::ingest_batch`] minus sequence validation: every
//! test result is independent of every other, so there is no batch-level
//! lifecycle check to run before storing.

use chrono::{DateTime, Utc};
use correlator_domain::{generate_dataset_urn, normalize_namespace, parse_dataset_urn, TestResult, TestStatus};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::pipeline::{find_internal_failure, BatchError, BatchSummary, IngestOutcome};
use crate::store::{StoreOutcome, TestResultStore};
use crate::validator::validate_test_result;

#[derive(Debug, Default, Deserialize)]
struct WireTestResult {
    #[serde(rename = "testName", default)]
    test_name: String,
    #[serde(rename = "testType", default)]
    test_type: String,
    #[serde(rename = "datasetURN", default)]
    dataset_urn: String,
    #[serde(rename = "jobRunID", default)]
    job_run_id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Value::default")]
    metadata: Value,
    #[serde(rename = "executedAt", default)]
    executed_at: String,
    #[serde(rename = "durationMs", default)]
    duration_ms: Option<u64>,
}

fn parse_executed_at(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::new("executedAt", "must not be empty"));
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::new("executedAt", format!("not RFC3339: {e}")))
}

/// Maps one wire-shaped JSON value to a domain [`TestResult`]: status parsing
/// is case-insensitive, and `datasetURN` is re-normalized through the same
/// namespace canonicalization lineage events use, per spec §4.5.
pub fn map_wire_test_result(value: &Value) -> Result<TestResult, ValidationError> {
    if value.is_null() {
        return Err(ValidationError::new("result", "is absent"));
    }
    let wire: WireTestResult = serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::new("result", format!("malformed: {e}")))?;

    let status = TestStatus::parse(wire.status.trim())
        .ok_or_else(|| ValidationError::new("status", format!("not a recognized test status: '{}'", wire.status)))?;
    let executed_at = parse_executed_at(&wire.executed_at)?;

    // Renormalize through the same (namespace, name) split lineage events use,
    // rather than running the whole URN through `normalize_namespace` directly
    // — that would fold the name's case too, which the canonicalizer never does.
    let dataset_urn = if wire.dataset_urn.trim().is_empty() {
        String::new()
    } else {
        match parse_dataset_urn(wire.dataset_urn.trim()) {
            Ok((namespace, name)) => generate_dataset_urn(&namespace, &name),
            Err(_) => normalize_namespace(wire.dataset_urn.trim()),
        }
    };

    Ok(TestResult {
        test_name: wire.test_name.trim().to_string(),
        test_type: wire.test_type.trim().to_string(),
        dataset_urn,
        job_run_id: wire.job_run_id.filter(|s| !s.trim().is_empty()),
        status,
        message: wire.message,
        metadata: wire.metadata,
        executed_at,
        duration_ms: wire.duration_ms,
    })
}

fn validation_failed(e: ValidationError) -> IngestOutcome {
    IngestOutcome::ValidationFailed { reason: format!("{}: {}", e.field, e.reason), non_retriable: true }
}

/// Ingests a batch of data-quality test results. Storage is UPSERT on
/// `(testName, datasetURN, executedAt)`; a duplicate is reported as success,
/// and FK violations on `datasetURN`/`jobRunID` are non-retriable per-record
/// failures that do not poison the rest of the batch.
pub fn ingest_test_result_batch<S: TestResultStore>(
    store: &S,
    raw_body: &[u8],
    max_body_size: usize,
) -> Result<(Vec<IngestOutcome>, BatchSummary), BatchError> {
    if raw_body.is_empty() {
        return Err(BatchError::EmptyBody);
    }
    if raw_body.len() > max_body_size {
        return Err(BatchError::PayloadTooLarge);
    }
    let values: Vec<Value> = serde_json::from_slice(raw_body).map_err(|e| BatchError::MalformedJson(e.to_string()))?;
    if values.is_empty() {
        return Err(BatchError::EmptyArray);
    }

    let mut outcomes: Vec<Option<IngestOutcome>> = vec![None; values.len()];
    let mut validated: Vec<(usize, TestResult)> = Vec::with_capacity(values.len());

    for (idx, value) in values.iter().enumerate() {
        match map_wire_test_result(value).and_then(|r| validate_test_result(&r).map(|()| r)) {
            Ok(result) => validated.push((idx, result)),
            Err(e) => outcomes[idx] = Some(validation_failed(e)),
        }
    }

    let back_index: Vec<usize> = validated.iter().map(|(idx, _)| *idx).collect();
    let results_to_store: Vec<TestResult> = validated.into_iter().map(|(_, r)| r).collect();
    let store_results = store.store_test_results(&results_to_store);

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
    let summary = crate::pipeline::summarize_outcomes(&outcomes);
    Ok((outcomes, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeStore {
        seen: Mutex<HashSet<(String, String, String)>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self { seen: Mutex::new(HashSet::new()) }
        }
    }

    impl TestResultStore for FakeStore {
        fn store_test_results(&self, results: &[TestResult]) -> Vec<Result<StoreOutcome, CoreError>> {
            let mut seen = self.seen.lock().unwrap();
            results
                .iter()
                .map(|r| {
                    let key = (r.test_name.clone(), r.dataset_urn.clone(), r.executed_at.to_rfc3339());
                    if seen.insert(key) {
                        Ok(StoreOutcome::Stored)
                    } else {
                        Ok(StoreOutcome::Duplicate)
                    }
                })
                .collect()
        }
    }

    fn wire_result(status: &str, dataset_urn: &str) -> Value {
        serde_json::json!({
            "testName": "not_null_order_id",
            "testType": "not_null",
            "datasetURN": dataset_urn,
            "status": status,
            "executedAt": "2025-10-21T10:00:00Z",
        })
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        let result = map_wire_test_result(&wire_result("PASSED", "dbt://analytics/orders")).unwrap();
        assert_eq!(result.status, TestStatus::Passed);
    }

    #[test]
    fn dataset_urn_is_renormalized() {
        let v = wire_result("failed", "Postgres://Host:5432/Orders");
        let result = map_wire_test_result(&v).unwrap();
        assert_eq!(result.dataset_urn, "postgresql://host/Orders");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = map_wire_test_result(&wire_result("WEIRD", "ns")).unwrap_err();
        assert_eq!(err.field, "status");
    }

    #[test]
    fn replay_is_duplicate_not_failure() {
        let store = FakeStore::new();
        let body = serde_json::to_vec(&vec![wire_result("passed", "dbt://analytics/orders")]).unwrap();
        ingest_test_result_batch(&store, &body, 1 << 20).unwrap();
        let (outcomes, summary) = ingest_test_result_batch(&store, &body, 1 << 20).unwrap();
        assert_eq!(summary.successful, 1);
        assert!(matches!(outcomes[0], IngestOutcome::Duplicate));
    }

    #[test]
    fn no_sequence_validation_independent_results_all_stored() {
        let store = FakeStore::new();
        let body = serde_json::to_vec(&vec![
            wire_result("passed", "dbt://analytics/orders"),
            wire_result("failed", "dbt://analytics/customers"),
        ])
        .unwrap();
        let (_, summary) = ingest_test_result_batch(&store, &body, 1 << 20).unwrap();
        assert_eq!(summary.successful, 2);
    }
}
