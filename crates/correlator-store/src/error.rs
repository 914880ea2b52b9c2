//! Maps Diesel/connection errors to semantic storage-layer variants, then on
//! into `correlator_core::CoreError` so callers above the store never see
//! Diesel types.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use correlator_core::{CoreError, StorageError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retriable)")]
    SerializationConflict,
    #[error("transient connection error: {0}")]
    TransientIo(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(info.message().to_string()),
                DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(info.message().to_string()),
                DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
                DatabaseErrorKind::CheckViolation => Self::Unknown(format!("check violation: {}", info.message())),
                other => Self::Unknown(format!("db error kind {other:?}: {}", info.message())),
            },
            DieselError::BrokenTransactionManager => Self::TransientIo("broken transaction manager".into()),
            other => Self::Unknown(format!("unhandled diesel error: {other}")),
        }
    }
}

/// Per spec §7: FK/uniqueness violations are non-retriable per-event;
/// serialization conflicts and connection errors are retriable; anything
/// unclassified is treated as a non-retriable storage error rather than
/// silently retried.
impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(msg) => CoreError::UniquenessViolation(msg),
            StoreError::ForeignKeyViolation(msg) => CoreError::ForeignKeyViolation(msg),
            StoreError::NotFound => CoreError::Storage(StorageError { cause: "not found".into(), retriable: false }),
            StoreError::SerializationConflict => {
                CoreError::Storage(StorageError { cause: "serialization conflict".into(), retriable: true })
            }
            StoreError::TransientIo(cause) => CoreError::Storage(StorageError { cause, retriable: true }),
            StoreError::Unknown(cause) => CoreError::Storage(StorageError { cause, retriable: false }),
        }
    }
}

/// Raised when the store's connection pool itself cannot be built or
/// checked out — a total outage, surfaced as a single batch-level error
/// rather than a per-event `StoreError` (spec §4.6: "the store signals a
/// total outage").
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool build error: {0}")]
    Build(String),
    #[error("pool checkout error: {0}")]
    Checkout(String),
    #[error("migration error: {0}")]
    Migration(String),
}
