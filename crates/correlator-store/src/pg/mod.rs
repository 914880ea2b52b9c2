//! Postgres (Diesel) implementation of `correlator-core`'s store traits.
//!
//! Each event/result is handled in its own transaction (spec §4.6): the
//! event/result row is inserted first under its natural/idempotency key —
//! a conflict there short-circuits to `Duplicate` with no further writes —
//! then `job_runs`/`datasets`/`lineage_edges` are upserted in the same
//! commit. Foreign keys between edges and their runs/datasets are declared
//! `DEFERRABLE INITIALLY DEFERRED` so independent events within one batch
//! can land in any order and still resolve by commit time.

use std::cell::RefCell;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;

use correlator_core::{CoreError, LineageReader, LineageStore, SequenceError, StoreOutcome, TestResultStore};
use correlator_core::lifecycle::validate_state_transition;
use correlator_domain::{generate_dataset_urn, generate_idempotency_key, generate_job_run_id, DatasetRef, EdgeType, EventType, JobRun, LineageEdge, RunEvent, TestResult, TestStatus};

use crate::error::{PoolError, StoreError};
use crate::migrations::run_pending_migrations;
use crate::schema::{datasets, job_runs, lineage_edges, run_events, test_results};

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Abstracts connection checkout so a fake pool can stand in for unit tests
/// that don't need a live database.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PoolError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PoolError> {
        self.pool.get().map_err(|e| PoolError::Checkout(e.to_string()))
    }
}

/// Builds an r2d2 Postgres pool and runs pending migrations against the
/// first checked-out connection.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PoolError> {
    let min = min_size.max(1).min(max_size.max(1));
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .min_idle(Some(min))
        .max_size(max_size.max(1))
        .build(manager)
        .map_err(|e| PoolError::Build(e.to_string()))?;
    let mut conn = pool.get().map_err(|e| PoolError::Checkout(e.to_string()))?;
    run_pending_migrations(&mut conn)?;
    Ok(pool)
}

fn is_retriable(e: &CoreError) -> bool {
    e.retriable()
}

/// Three attempts, 15/30/45ms backoff — mirrors the retry shape used
/// elsewhere in this pack for transient storage errors.
fn with_retry<F, T>(mut f: F) -> Result<T, CoreError>
where
    F: FnMut() -> Result<T, CoreError>,
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retriable(&e) && attempts < 3 => {
                let delay_ms = 15 * (attempts + 1);
                warn!("retriable storage error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

fn event_type_to_storage(t: EventType) -> &'static str {
    t.as_str()
}

fn event_type_from_storage(s: &str) -> EventType {
    match s {
        "START" => EventType::Start,
        "RUNNING" => EventType::Running,
        "COMPLETE" => EventType::Complete,
        "FAIL" => EventType::Fail,
        "ABORT" => EventType::Abort,
        _ => EventType::Other,
    }
}

fn edge_type_to_storage(t: &EdgeType) -> &'static str {
    t.as_str()
}

#[derive(Queryable, Debug)]
struct JobRunRow {
    job_run_id: String,
    run_id: String,
    job_name: String,
    job_namespace: String,
    producer: String,
    current_state: String,
    event_time: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    parent_run_id: Option<String>,
}

impl From<JobRunRow> for JobRun {
    fn from(row: JobRunRow) -> Self {
        JobRun {
            job_run_id: row.job_run_id,
            run_id: row.run_id,
            job_name: row.job_name,
            job_namespace: row.job_namespace,
            producer: row.producer,
            current_state: event_type_from_storage(&row.current_state),
            event_time: row.event_time,
            started_at: row.started_at,
            completed_at: row.completed_at,
            parent_run_id: row.parent_run_id,
        }
    }
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = job_runs)]
struct JobRunChangeset<'a> {
    job_run_id: &'a str,
    run_id: &'a str,
    job_name: &'a str,
    job_namespace: &'a str,
    producer: &'a str,
    current_state: &'a str,
    event_time: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    parent_run_id: Option<&'a str>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = run_events)]
struct NewRunEventRow<'a> {
    idempotency_key: &'a str,
    job_run_id: &'a str,
    event_time: DateTime<Utc>,
    event_type: &'a str,
    producer: &'a str,
    schema_url: &'a str,
    payload: &'a Value,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = datasets)]
struct NewDatasetRow<'a> {
    dataset_urn: &'a str,
    namespace: &'a str,
    name: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = lineage_edges)]
struct NewEdgeRow<'a> {
    job_run_id: &'a str,
    dataset_urn: &'a str,
    edge_type: &'a str,
}

#[derive(Queryable, Debug)]
struct LineageEdgeRow {
    job_run_id: String,
    dataset_urn: String,
    edge_type: String,
}

impl From<LineageEdgeRow> for LineageEdge {
    fn from(row: LineageEdgeRow) -> Self {
        let edge_type = if row.edge_type == "input" { EdgeType::Input } else { EdgeType::Output };
        LineageEdge { job_run_id: row.job_run_id, dataset_urn: row.dataset_urn, edge_type }
    }
}

#[derive(Queryable, Debug)]
struct TestResultRow {
    id: i64,
    test_name: String,
    test_type: String,
    dataset_urn: String,
    job_run_id: Option<String>,
    status: String,
    message: Option<String>,
    metadata: Value,
    executed_at: DateTime<Utc>,
    duration_ms: Option<i64>,
}

impl From<TestResultRow> for (i64, TestResult) {
    fn from(row: TestResultRow) -> Self {
        let status = TestStatus::parse(&row.status).unwrap_or(TestStatus::Error);
        (
            row.id,
            TestResult {
                test_name: row.test_name,
                test_type: row.test_type,
                dataset_urn: row.dataset_urn,
                job_run_id: row.job_run_id,
                status,
                message: row.message,
                metadata: row.metadata,
                executed_at: row.executed_at,
                duration_ms: row.duration_ms.map(|d| d as u64),
            },
        )
    }
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = test_results)]
struct TestResultChangeset<'a> {
    test_name: &'a str,
    test_type: &'a str,
    dataset_urn: &'a str,
    job_run_id: Option<&'a str>,
    status: &'a str,
    message: Option<&'a str>,
    metadata: &'a Value,
    executed_at: DateTime<Utc>,
    duration_ms: Option<i64>,
}

/// Upserts a dataset's row and its lineage edge to `job_run_id`, ignoring
/// rows that already exist — dataset identity and edge triples are stable
/// once derived, so a conflict is simply a no-op.
fn upsert_dataset_and_edge(
    conn: &mut PgConnection,
    job_run_id: &str,
    dataset: &DatasetRef,
    edge_type: &EdgeType,
) -> Result<(), diesel::result::Error> {
    let urn = generate_dataset_urn(&dataset.namespace, &dataset.name);
    diesel::insert_into(datasets::table)
        .values(NewDatasetRow { dataset_urn: &urn, namespace: &dataset.namespace, name: &dataset.name })
        .on_conflict(datasets::dataset_urn)
        .do_nothing()
        .execute(conn)?;
    diesel::insert_into(lineage_edges::table)
        .values(NewEdgeRow { job_run_id, dataset_urn: &urn, edge_type: edge_type_to_storage(edge_type) })
        .on_conflict((lineage_edges::job_run_id, lineage_edges::dataset_urn, lineage_edges::edge_type))
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

/// Applies the lifecycle transition constraint (spec §4.3) as the storage
/// layer's second line of defense, then upserts the `job_runs` row.
/// `violation` is a side channel: Diesel's closure-based transactions need
/// their error type to come from `diesel::result::Error`, so a detected
/// sequence violation is recorded here and the closure forces a rollback by
/// returning `RollbackTransaction`; the caller checks this cell afterward.
fn upsert_job_run(
    conn: &mut PgConnection,
    event: &RunEvent,
    job_run_id: &str,
    violation: &RefCell<Option<SequenceError>>,
) -> Result<(), diesel::result::Error> {
    let existing: Option<JobRunRow> =
        job_runs::table.filter(job_runs::job_run_id.eq(job_run_id)).first(conn).optional()?;

    let next_state = match &existing {
        None => event.event_type,
        Some(row) => {
            let current = event_type_from_storage(&row.current_state);
            match validate_state_transition(current, event.event_type) {
                Ok(()) => event.event_type,
                Err(kind) => {
                    *violation.borrow_mut() = Some(SequenceError {
                        kind,
                        index: 0,
                        from: Some(current),
                        to: Some(event.event_type),
                    });
                    return Err(diesel::result::Error::RollbackTransaction);
                }
            }
        }
    };

    let started_at = existing.as_ref().and_then(|r| r.started_at).or_else(|| {
        if next_state == EventType::Start { Some(event.event_time) } else { None }
    });
    let completed_at = existing.as_ref().and_then(|r| r.completed_at).or_else(|| {
        if next_state.is_terminal() { Some(event.event_time) } else { None }
    });
    let parent_run_id = existing.as_ref().and_then(|r| r.parent_run_id.clone());

    let changeset = JobRunChangeset {
        job_run_id,
        run_id: &event.run.run_id,
        job_name: &event.job.name,
        job_namespace: &event.job.namespace,
        producer: &event.producer,
        current_state: event_type_to_storage(next_state),
        event_time: event.event_time,
        started_at,
        completed_at,
        parent_run_id: parent_run_id.as_deref(),
    };

    diesel::insert_into(job_runs::table)
        .values(&changeset)
        .on_conflict(job_runs::job_run_id)
        .do_update()
        .set(&changeset)
        .execute(conn)?;
    Ok(())
}

/// Postgres-backed implementation of the core's write and read traits.
pub struct PgLineageStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgLineageStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn store_one_event(&self, event: &RunEvent) -> Result<StoreOutcome, CoreError> {
        let job_run_id = generate_job_run_id(&event.job.namespace, &event.job.name, &event.run.run_id);
        let event_time_nanos = event.event_time.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let idempotency_key = generate_idempotency_key(
            &event.producer,
            &event.job.namespace,
            &event.job.name,
            &event.run.run_id,
            &event_time_nanos,
            event.event_type.as_str(),
        );
        let payload = serde_json::to_value(event).map_err(|e| {
            CoreError::Storage(correlator_core::StorageError { cause: e.to_string(), retriable: false })
        })?;

        with_retry(|| {
            let mut conn = self.provider.connection().map_err(|e| CoreError::Internal(e.to_string()))?;
            let violation: RefCell<Option<SequenceError>> = RefCell::new(None);

            let result: Result<StoreOutcome, diesel::result::Error> = conn.transaction(|tx_conn| {
                let inserted = diesel::insert_into(run_events::table)
                    .values(NewRunEventRow {
                        idempotency_key: &idempotency_key,
                        job_run_id: &job_run_id,
                        event_time: event.event_time,
                        event_type: event.event_type.as_str(),
                        producer: &event.producer,
                        schema_url: &event.schema_url,
                        payload: &payload,
                    })
                    .on_conflict(run_events::idempotency_key)
                    .do_nothing()
                    .execute(tx_conn)?;

                if inserted == 0 {
                    return Ok(StoreOutcome::Duplicate);
                }

                upsert_job_run(tx_conn, event, &job_run_id, &violation)?;
                for input in &event.inputs {
                    upsert_dataset_and_edge(tx_conn, &job_run_id, input, &EdgeType::Input)?;
                }
                for output in &event.outputs {
                    upsert_dataset_and_edge(tx_conn, &job_run_id, output, &EdgeType::Output)?;
                }
                Ok(StoreOutcome::Stored)
            });

            match result {
                Ok(outcome) => {
                    debug!("store_one_event: job_run_id={job_run_id} outcome={outcome:?}");
                    Ok(outcome)
                }
                Err(diesel::result::Error::RollbackTransaction) => {
                    if let Some(seq_err) = violation.borrow_mut().take() {
                        Err(CoreError::Sequence(seq_err))
                    } else {
                        Err(StoreError::Unknown("transaction rolled back with no recorded cause".into()).into())
                    }
                }
                Err(e) => Err(StoreError::from(e).into()),
            }
        })
    }
}

impl<P: ConnectionProvider> LineageStore for PgLineageStore<P> {
    fn store_events(&self, events: &[RunEvent]) -> Vec<Result<StoreOutcome, CoreError>> {
        events.iter().map(|e| self.store_one_event(e)).collect()
    }

    fn health_check(&self) -> Result<(), CoreError> {
        let mut conn = self.provider.connection().map_err(|e| CoreError::Internal(e.to_string()))?;
        diesel::sql_query("SELECT 1").execute(&mut conn).map(|_| ()).map_err(|e| StoreError::from(e).into())
    }
}

impl<P: ConnectionProvider> TestResultStore for PgLineageStore<P> {
    fn store_test_results(&self, results: &[TestResult]) -> Vec<Result<StoreOutcome, CoreError>> {
        results.iter().map(|r| self.store_one_test_result(r)).collect()
    }
}

impl<P: ConnectionProvider> PgLineageStore<P> {
    fn store_one_test_result(&self, result: &TestResult) -> Result<StoreOutcome, CoreError> {
        with_retry(|| {
            let mut conn = self.provider.connection().map_err(|e| CoreError::Internal(e.to_string()))?;

            let db_result: Result<StoreOutcome, diesel::result::Error> = conn.transaction(|tx_conn| {
                let existing_id: Option<i64> = test_results::table
                    .filter(test_results::test_name.eq(&result.test_name))
                    .filter(test_results::dataset_urn.eq(&result.dataset_urn))
                    .filter(test_results::executed_at.eq(result.executed_at))
                    .select(test_results::id)
                    .first(tx_conn)
                    .optional()?;

                let changeset = TestResultChangeset {
                    test_name: &result.test_name,
                    test_type: &result.test_type,
                    dataset_urn: &result.dataset_urn,
                    job_run_id: result.job_run_id.as_deref(),
                    status: status_to_storage(result.status),
                    message: result.message.as_deref(),
                    metadata: &result.metadata,
                    executed_at: result.executed_at,
                    duration_ms: result.duration_ms.map(|d| d as i64),
                };

                match existing_id {
                    Some(id) => {
                        diesel::update(test_results::table.filter(test_results::id.eq(id)))
                            .set(&changeset)
                            .execute(tx_conn)?;
                        Ok(StoreOutcome::Duplicate)
                    }
                    None => {
                        diesel::insert_into(test_results::table).values(&changeset).execute(tx_conn)?;
                        Ok(StoreOutcome::Stored)
                    }
                }
            });

            db_result.map_err(|e| StoreError::from(e).into())
        })
    }
}

fn status_to_storage(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "passed",
        TestStatus::Failed => "failed",
        TestStatus::Error => "error",
        TestStatus::Skipped => "skipped",
    }
}

impl<P: ConnectionProvider> LineageReader for PgLineageStore<P> {
    fn find_job_run(&self, job_run_id: &str) -> Result<Option<JobRun>, CoreError> {
        let mut conn = self.checkout()?;
        let row: Option<JobRunRow> =
            job_runs::table.filter(job_runs::job_run_id.eq(job_run_id)).first(&mut conn).optional().map_err(|e| StoreError::from(e))?;
        Ok(row.map(JobRun::from))
    }

    fn find_parent_job_run(&self, job_run_id: &str) -> Result<Option<JobRun>, CoreError> {
        let mut conn = self.checkout()?;
        let parent_run_id: Option<String> = job_runs::table
            .filter(job_runs::job_run_id.eq(job_run_id))
            .select(job_runs::parent_run_id)
            .first(&mut conn)
            .optional()
            .map_err(StoreError::from)?
            .flatten();
        let Some(parent_run_id) = parent_run_id else { return Ok(None) };
        let row: Option<JobRunRow> =
            job_runs::table.filter(job_runs::job_run_id.eq(&parent_run_id)).first(&mut conn).optional().map_err(StoreError::from)?;
        Ok(row.map(JobRun::from))
    }

    fn outgoing_edges(&self, dataset_urn: &str) -> Result<Vec<LineageEdge>, CoreError> {
        let mut conn = self.checkout()?;
        let rows: Vec<LineageEdgeRow> = lineage_edges::table
            .filter(lineage_edges::dataset_urn.eq(dataset_urn))
            .filter(lineage_edges::edge_type.eq("input"))
            .load(&mut conn)
            .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(LineageEdge::from).collect())
    }

    fn incoming_edges(&self, dataset_urn: &str) -> Result<Vec<LineageEdge>, CoreError> {
        let mut conn = self.checkout()?;
        let rows: Vec<LineageEdgeRow> = lineage_edges::table
            .filter(lineage_edges::dataset_urn.eq(dataset_urn))
            .filter(lineage_edges::edge_type.eq("output"))
            .load(&mut conn)
            .map_err(StoreError::from)?;
        Ok(rows.into_iter().map(LineageEdge::from).collect())
    }

    fn job_runs_for_dataset(&self, dataset_urn: &str, edge_type: EdgeType) -> Result<Vec<JobRun>, CoreError> {
        let mut conn = self.checkout()?;
        let job_run_ids: Vec<String> = lineage_edges::table
            .filter(lineage_edges::dataset_urn.eq(dataset_urn))
            .filter(lineage_edges::edge_type.eq(edge_type.as_str()))
            .select(lineage_edges::job_run_id)
            .load(&mut conn)
            .map_err(StoreError::from)?;
        let rows: Vec<JobRunRow> =
            job_runs::table.filter(job_runs::job_run_id.eq_any(job_run_ids)).load(&mut conn).map_err(StoreError::from)?;
        Ok(rows.into_iter().map(JobRun::from).collect())
    }

    fn edges_for_job_run(&self, job_run_id: &str) -> Result<Vec<LineageEdge>, CoreError> {
        let mut conn = self.checkout()?;
        let rows: Vec<LineageEdgeRow> =
            lineage_edges::table.filter(lineage_edges::job_run_id.eq(job_run_id)).load(&mut conn).map_err(StoreError::from)?;
        Ok(rows.into_iter().map(LineageEdge::from).collect())
    }

    fn all_dataset_urns(&self) -> Result<Vec<String>, CoreError> {
        let mut conn = self.checkout()?;
        datasets::table.select(datasets::dataset_urn).load(&mut conn).map_err(|e| StoreError::from(e).into())
    }

    fn dataset_urns_with_output_edge(&self) -> Result<Vec<String>, CoreError> {
        let mut conn = self.checkout()?;
        lineage_edges::table
            .filter(lineage_edges::edge_type.eq("output"))
            .select(lineage_edges::dataset_urn)
            .distinct()
            .load(&mut conn)
            .map_err(|e| StoreError::from(e).into())
    }

    fn test_results(
        &self,
        executed_after: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<(i64, TestResult)>, i64), CoreError> {
        let mut conn = self.checkout()?;
        let mut count_query = test_results::table.into_boxed();
        let mut page_query = test_results::table.into_boxed();
        if let Some(after) = executed_after {
            count_query = count_query.filter(test_results::executed_at.ge(after));
            page_query = page_query.filter(test_results::executed_at.ge(after));
        }
        let total: i64 = count_query.count().get_result(&mut conn).map_err(StoreError::from)?;
        let rows: Vec<TestResultRow> = page_query
            .order((test_results::executed_at.desc(), test_results::id.desc()))
            .limit(limit)
            .offset(offset)
            .load(&mut conn)
            .map_err(StoreError::from)?;
        Ok((rows.into_iter().map(<(i64, TestResult)>::from).collect(), total))
    }

    fn test_result_by_id(&self, id: i64) -> Result<Option<(i64, TestResult)>, CoreError> {
        let mut conn = self.checkout()?;
        let row: Option<TestResultRow> =
            test_results::table.filter(test_results::id.eq(id)).first(&mut conn).optional().map_err(StoreError::from)?;
        Ok(row.map(<(i64, TestResult)>::from))
    }
}

impl<P: ConnectionProvider> PgLineageStore<P> {
    /// Connection-pool checkout failure is a total outage, not a per-query
    /// error — reported as `CoreError::Internal` so callers never mistake it
    /// for a retriable-per-item storage failure.
    fn checkout(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, CoreError> {
        self.provider.connection().map_err(|e| CoreError::Internal(e.to_string()))
    }
}
