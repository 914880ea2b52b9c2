//! OpenLineage run event model.
//!
//! `RunEvent` is the domain record the ingestion pipeline maps wire events
//! into (see `correlator-core::pipeline`). This crate only owns the shape and
//! the lifecycle state enum — validation and transition legality live in
//! `correlator-core`, which stays the sole place sequencing rules are
//! expressed, per the "dual layer enforcement" note in the component spec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OpenLineage run lifecycle state. `Other` is transparent: it neither
/// advances nor rejects the run's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Start,
    Running,
    Complete,
    Fail,
    Abort,
    Other,
}

impl EventType {
    /// Terminal states are idempotent and immutable: only `t -> t` is legal.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventType::Complete | EventType::Fail | EventType::Abort)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Start => "START",
            EventType::Running => "RUNNING",
            EventType::Complete => "COMPLETE",
            EventType::Fail => "FAIL",
            EventType::Abort => "ABORT",
            EventType::Other => "OTHER",
        }
    }
}

/// A dataset reference as it appears on the wire, prior to URN
/// canonicalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetRef {
    pub namespace: String,
    pub name: String,
    #[serde(default = "Value::default")]
    pub facets: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRef {
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(default = "Value::default")]
    pub facets: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRef {
    pub namespace: String,
    pub name: String,
    #[serde(default = "Value::default")]
    pub facets: Value,
}

/// Domain-shaped lineage event, produced by mapping a wire OpenLineage event
/// through the ingestion pipeline's mapping stage.
///
/// Invariant: `inputs`/`outputs` are always present (possibly empty), never
/// absent — the mapping stage coerces a missing array to `vec![]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_time: DateTime<Utc>,
    pub event_type: EventType,
    pub producer: String,
    pub schema_url: String,
    pub run: RunRef,
    pub job: JobRef,
    pub inputs: Vec<DatasetRef>,
    pub outputs: Vec<DatasetRef>,
}

impl RunEvent {
    /// The run's identity as emitted by the producer, prior to hashing into a
    /// stable `job_run_id`.
    pub fn run_key(&self) -> (&str, &str, &str) {
        (self.job.namespace.as_str(), self.job.name.as_str(), self.run.run_id.as_str())
    }
}
