//! Diesel schema, hand-declared to match the migrations under `migrations/`.
//! Regenerate with `diesel print-schema` after a real migration is added.
//!
//! Tables:
//! - `job_runs`: one row per `(job.namespace, job.name, run.runID)`, keyed by
//!   the SHA-256 job-run id, UPSERTed under the lifecycle transition
//!   constraints enforced at the storage layer (spec §4.6).
//! - `datasets`: canonical dataset URNs referenced by any event.
//! - `lineage_edges`: `(job_run_id, dataset_urn, edge_type)` triple-keyed
//!   input/output adjacency.
//! - `run_events`: append-only, one row per idempotency key.
//! - `test_results`: UPSERT on `(test_name, dataset_urn, executed_at)`.

diesel::table! {
    job_runs (job_run_id) {
        job_run_id -> Text,
        run_id -> Text,
        job_name -> Text,
        job_namespace -> Text,
        producer -> Text,
        current_state -> Text,
        event_time -> Timestamptz,
        started_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        parent_run_id -> Nullable<Text>,
    }
}

diesel::table! {
    datasets (dataset_urn) {
        dataset_urn -> Text,
        namespace -> Text,
        name -> Text,
    }
}

diesel::table! {
    lineage_edges (job_run_id, dataset_urn, edge_type) {
        job_run_id -> Text,
        dataset_urn -> Text,
        edge_type -> Text,
    }
}

diesel::table! {
    run_events (idempotency_key) {
        idempotency_key -> Text,
        job_run_id -> Text,
        event_time -> Timestamptz,
        event_type -> Text,
        producer -> Text,
        schema_url -> Text,
        payload -> Jsonb,
    }
}

diesel::table! {
    test_results (id) {
        id -> BigInt,
        test_name -> Text,
        test_type -> Text,
        dataset_urn -> Text,
        job_run_id -> Nullable<Text>,
        status -> Text,
        message -> Nullable<Text>,
        metadata -> Jsonb,
        executed_at -> Timestamptz,
        duration_ms -> Nullable<BigInt>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(job_runs, datasets, lineage_edges, run_events, test_results,);
