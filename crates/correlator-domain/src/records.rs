//! Logical stored-entity shapes shared between `correlator-store` (which owns
//! writes) and `correlator-query` (which holds read-only views). These are
//! not a physical schema — `correlator-store` maps them to Diesel rows.

use chrono::{DateTime, Utc};

use crate::event::EventType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeType {
    Input,
    Output,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Input => "input",
            EdgeType::Output => "output",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub dataset_urn: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct JobRun {
    pub job_run_id: String,
    pub run_id: String,
    pub job_name: String,
    pub job_namespace: String,
    pub producer: String,
    pub current_state: EventType,
    pub event_time: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parent_run_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LineageEdge {
    pub job_run_id: String,
    pub dataset_urn: String,
    pub edge_type: EdgeType,
}
