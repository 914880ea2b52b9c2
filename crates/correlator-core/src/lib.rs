//! correlator-core: validation, lifecycle sequencing, and batch ingestion for
//! lineage events and test results.
//!
//! Module map:
//! - `error`: the closed error taxonomy (`CoreError` and its constituents).
//! - `wire` / `validator`: mapping and structural validation for run events.
//! - `lifecycle`: the state-transition table and single-run sequence check.
//! - `pipeline`: the lineage-event ingestion pipeline (`ingest_batch`).
//! - `test_ingestor`: the test-result ingestion pipeline, same shape minus
//!   sequence validation.
//! - `store`: the trait boundary `correlator-store` implements and
//!   `correlator-query` reads through.

pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod store;
pub mod test_ingestor;
pub mod validator;
pub mod wire;

pub use error::{CoreError, SequenceError, SequenceErrorKind, StorageError, ValidationError};
pub use pipeline::{ingest_batch, BatchError, BatchSummary, IngestOutcome, IngestResult};
pub use store::{LineageReader, LineageStore, StoreOutcome, TestResultStore};
pub use test_ingestor::ingest_test_result_batch;
