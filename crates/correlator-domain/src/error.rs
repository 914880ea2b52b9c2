use thiserror::Error;

/// Errors raised while canonicalizing or parsing identifiers.
///
/// Kept separate from `correlator-core::error::CoreError` so this crate stays
/// free of any knowledge of the ingestion/validation pipeline — it only knows
/// how to mint and parse stable identifiers.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("dataset urn has no separator between namespace and name: {0}")]
    MissingUrnSeparator(String),
    #[error("dataset urn namespace does not re-normalize to itself: {0}")]
    UnstableUrnNamespace(String),
    #[error("empty namespace")]
    EmptyNamespace,
    #[error("empty name")]
    EmptyName,
}
