//! Embedded migration runner. The SQL dialect and migration authoring
//! themselves are out of scope for this crate's contract (spec §1); this is
//! just the thin wrapper the CLI's `migrate` subcommand and pool builder
//! call into.

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::PoolError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<(), PoolError> {
    conn.run_pending_migrations(MIGRATIONS).map(|_| ()).map_err(|e| PoolError::Migration(e.to_string()))
}
