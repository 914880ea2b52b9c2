//! correlator-store: the Diesel/Postgres implementation of
//! `correlator-core`'s `LineageStore`, `TestResultStore`, and `LineageReader`
//! trait boundary.
//!
//! Modules:
//! - `pg`: the Postgres implementation, connection pooling, and retry logic.
//! - `migrations`: embedded migration runner.
//! - `config`: env-driven connection pool configuration.
//! - `schema`: hand-declared Diesel table definitions.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, ConfigError, DbConfig};
pub use error::{PoolError, StoreError};
pub use pg::{build_pool, ConnectionProvider, PgLineageStore, PgPool, PoolProvider};
