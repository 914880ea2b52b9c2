//! correlator-domain: canonicalization and the wire/stored data model.
//!
//! Responsibilities:
//! - `urn`: namespace/name -> stable dataset URN, and its inverse.
//! - `ids`: hash-derived job-run IDs and idempotency keys.
//! - `event`: the OpenLineage lifecycle enum and `RunEvent` domain record.
//! - `test_result`: the data-quality `TestResult` domain record.
//! - `records`: logical stored-entity shapes shared by the store and query
//!   layers.
//!
//! This crate is pure: no I/O, no persistence, no knowledge of HTTP. Every
//! function here is a referentially transparent mapping from inputs to
//! outputs, which is what lets `correlator-core` and `correlator-query` reuse
//! it without pulling in a database or async runtime.

pub mod error;
pub mod event;
pub mod ids;
pub mod records;
pub mod test_result;
pub mod urn;

pub use error::DomainError;
pub use event::{DatasetRef, EventType, JobRef, RunEvent, RunRef};
pub use ids::{generate_idempotency_key, generate_job_run_id};
pub use records::{Dataset, EdgeType, JobRun, LineageEdge};
pub use test_result::{TestResult, TestStatus};
pub use urn::{generate_dataset_urn, normalize_namespace, parse_dataset_urn};
