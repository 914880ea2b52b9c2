//! Closed error taxonomy for the correlation core (spec §7).
//!
//! Modeled as a closed sum type per the design note in spec §9: the source
//! this was distilled from mixed sentinel errors with wrapped error values;
//! here every variant is named, every cause is carried (`#[source]`), and
//! nothing is ever downcast-and-reclassified.

use correlator_domain::EventType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single structural/conformance failure on one event (§4.2). Always
/// non-retriable.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

/// The kind of lifecycle-sequence violation found while validating a
/// single-run batch (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceErrorKind {
    DuplicateStart,
    BackwardTransition,
    TerminalImmutable,
    InvalidTransition,
    EmptyEventList,
}

/// A batch-level lifecycle failure. Fails the whole batch — partial success
/// is not permitted across a corrupted lifecycle.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[error("sequence error {kind:?} at index {index}: {from:?} -> {to:?}")]
pub struct SequenceError {
    pub kind: SequenceErrorKind,
    pub index: usize,
    pub from: Option<EventType>,
    pub to: Option<EventType>,
}

impl SequenceError {
    pub fn empty_event_list() -> Self {
        Self { kind: SequenceErrorKind::EmptyEventList, index: 0, from: None, to: None }
    }
}

/// Storage-layer failure for a single event. `retriable` distinguishes
/// transient conditions (connectivity, timeout, serialization conflict) from
/// permanent ones.
#[derive(Debug, Error, Clone)]
#[error("storage error: {cause}")]
pub struct StorageError {
    pub cause: String,
    pub retriable: bool,
}

/// Per-event or batch-level error surfaced by the correlation core.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("uniqueness violation: {0}")]
    UniquenessViolation(String),
    /// The store signalled a total outage; the whole batch fails rather than
    /// reporting a per-event storage failure.
    #[error("internal storage failure: {0}")]
    Internal(String),
}

impl CoreError {
    /// Per §7: validation errors, FK/uniqueness violations are always
    /// non-retriable; storage errors carry their own flag; sequence/internal
    /// errors are batch-level and have no retriable notion at the event
    /// granularity.
    pub fn retriable(&self) -> bool {
        match self {
            CoreError::Storage(s) => s.retriable,
            // A pool/connection-checkout failure may be a transient blip
            // (momentary exhaustion) worth the same bounded backoff as a
            // transient storage error; if it persists past that backoff it
            // still surfaces as `Internal` and escalates to a batch failure.
            CoreError::Internal(_) => true,
            _ => false,
        }
    }
}
