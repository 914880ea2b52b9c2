//! Response DTOs for the routes in §6. Wire shapes for lineage events and
//! test results are not duplicated here — `correlator-core::pipeline` parses
//! the raw request body directly, so the "request" side of those two routes
//! has no DTO of its own.

use chrono::{DateTime, Utc};
use correlator_core::{BatchSummary, IngestOutcome};
use correlator_query::{CorrelationStatus, DownstreamResult, Health, Incident, MatchReason, OrphanDataset, SuggestedPattern, UpstreamResult};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BatchSummaryDto {
    pub received: usize,
    pub successful: usize,
    pub failed: usize,
    pub retriable: usize,
    pub non_retriable: usize,
}

impl From<BatchSummary> for BatchSummaryDto {
    fn from(s: BatchSummary) -> Self {
        Self { received: s.received, successful: s.successful, failed: s.failed, retriable: s.retriable, non_retriable: s.non_retriable }
    }
}

#[derive(Debug, Serialize)]
pub struct FailedEventDto {
    pub index: usize,
    pub reason: String,
    pub retriable: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchResponseBody {
    pub status: &'static str,
    pub summary: BatchSummaryDto,
    pub failed_events: Vec<FailedEventDto>,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl BatchResponseBody {
    pub fn from_outcomes(outcomes: &[IngestOutcome], summary: BatchSummary, correlation_id: String) -> Self {
        let failed_events = outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                IngestOutcome::ValidationFailed { reason, non_retriable } => {
                    Some(FailedEventDto { index, reason: reason.clone(), retriable: !non_retriable })
                }
                IngestOutcome::StorageFailed { reason, retriable } => Some(FailedEventDto { index, reason: reason.clone(), retriable: *retriable }),
                _ => None,
            })
            .collect();

        let status = if summary.failed == 0 {
            "success"
        } else if summary.successful > 0 {
            "partial_success"
        } else {
            "failure"
        };

        Self { status, summary: summary.into(), failed_events, correlation_id, timestamp: Utc::now() }
    }
}

pub(crate) fn status_label(status: CorrelationStatus) -> &'static str {
    match status {
        CorrelationStatus::Unknown => "unknown",
        CorrelationStatus::Orphan => "orphan",
        CorrelationStatus::Correlated => "correlated",
    }
}

#[derive(Debug, Serialize)]
pub struct JobRunDto {
    pub job_run_id: String,
    pub run_id: String,
    pub job_name: String,
    pub job_namespace: String,
    pub producer: String,
    pub current_state: String,
    pub event_time: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parent_run_id: Option<String>,
}

impl From<&correlator_domain::JobRun> for JobRunDto {
    fn from(r: &correlator_domain::JobRun) -> Self {
        Self {
            job_run_id: r.job_run_id.clone(),
            run_id: r.run_id.clone(),
            job_name: r.job_name.clone(),
            job_namespace: r.job_namespace.clone(),
            producer: r.producer.clone(),
            current_state: r.current_state.as_str().to_string(),
            event_time: r.event_time,
            started_at: r.started_at,
            completed_at: r.completed_at,
            parent_run_id: r.parent_run_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TestResultDto {
    pub test_name: String,
    pub test_type: String,
    pub dataset_urn: String,
    pub job_run_id: Option<String>,
    pub status: &'static str,
    pub message: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
}

impl From<&correlator_domain::TestResult> for TestResultDto {
    fn from(t: &correlator_domain::TestResult) -> Self {
        let status = match t.status {
            correlator_domain::TestStatus::Passed => "passed",
            correlator_domain::TestStatus::Failed => "failed",
            correlator_domain::TestStatus::Error => "error",
            correlator_domain::TestStatus::Skipped => "skipped",
        };
        Self {
            test_name: t.test_name.clone(),
            test_type: t.test_type.clone(),
            dataset_urn: t.dataset_urn.clone(),
            job_run_id: t.job_run_id.clone(),
            status,
            message: t.message.clone(),
            executed_at: t.executed_at,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentDto {
    pub id: i64,
    pub test: TestResultDto,
    pub job: Option<JobRunDto>,
    pub correlation_status: &'static str,
}

impl From<&Incident> for IncidentDto {
    fn from(i: &Incident) -> Self {
        Self { id: i.id, test: (&i.test_result).into(), job: i.job_run.as_ref().map(Into::into), correlation_status: status_label(i.status) }
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentsResponse {
    pub incidents: Vec<IncidentDto>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub orphan_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DownstreamDto {
    pub dataset_urn: String,
    pub name: String,
    pub depth: u32,
    pub parent_urn: Option<String>,
    pub producer: String,
}

impl From<&DownstreamResult> for DownstreamDto {
    fn from(r: &DownstreamResult) -> Self {
        Self { dataset_urn: r.dataset_urn.clone(), name: r.name.clone(), depth: r.depth, parent_urn: r.parent_urn.clone(), producer: r.producer.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct UpstreamDto {
    pub dataset_urn: String,
    pub name: String,
    pub depth: u32,
    pub child_urn: Option<String>,
    pub producer: String,
}

impl From<&UpstreamResult> for UpstreamDto {
    fn from(r: &UpstreamResult) -> Self {
        Self { dataset_urn: r.dataset_urn.clone(), name: r.name.clone(), depth: r.depth, child_urn: r.child_urn.clone(), producer: r.producer.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentDetailResponse {
    pub test: TestResultDto,
    pub dataset_urn: String,
    pub job: Option<JobRunDto>,
    pub upstream: Vec<UpstreamDto>,
    pub downstream: Vec<DownstreamDto>,
    pub correlation_status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SuggestedMatchDto {
    pub canonical_urn: String,
    pub match_reason: &'static str,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct OrphanDatasetDto {
    pub dataset_urn: String,
    pub name: String,
    pub suggested_match: Option<SuggestedMatchDto>,
}

impl From<&OrphanDataset> for OrphanDatasetDto {
    fn from(o: &OrphanDataset) -> Self {
        Self {
            dataset_urn: o.dataset_urn.clone(),
            name: o.name.clone(),
            suggested_match: o.suggested_match.as_ref().map(|m| SuggestedMatchDto {
                canonical_urn: m.canonical_urn.clone(),
                match_reason: match m.match_reason {
                    MatchReason::ExactTableName => "exact_table_name",
                    MatchReason::FuzzyStructural => "fuzzy_structural",
                },
                confidence: m.confidence,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuggestedPatternDto {
    pub pattern: String,
    pub canonical: String,
    pub resolves_count: usize,
    pub orphans_resolved: Vec<String>,
}

impl From<&SuggestedPattern> for SuggestedPatternDto {
    fn from(p: &SuggestedPattern) -> Self {
        Self { pattern: p.pattern.clone(), canonical: p.canonical.clone(), resolves_count: p.resolves_count, orphans_resolved: p.orphans_resolved.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub correlation_rate: f64,
    pub total_datasets: i64,
    pub produced_datasets: i64,
    pub correlated_datasets: i64,
    pub orphan_datasets: Vec<OrphanDatasetDto>,
    pub suggested_patterns: Vec<SuggestedPatternDto>,
}

impl HealthResponse {
    pub fn assemble(health: Health, produced_datasets: i64, orphans: &[OrphanDataset], patterns: &[SuggestedPattern]) -> Self {
        Self {
            correlation_rate: health.correlation_rate,
            total_datasets: health.total_datasets,
            produced_datasets,
            correlated_datasets: health.correlated_datasets,
            orphan_datasets: orphans.iter().map(Into::into).collect(),
            suggested_patterns: patterns.iter().map(Into::into).collect(),
        }
    }
}
