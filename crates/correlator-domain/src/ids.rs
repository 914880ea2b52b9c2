//! Hash-derived identifiers: job-run IDs and idempotency keys.
//!
//! Both are hex-encoded SHA-256 digests over pipe-delimited concatenations of
//! their inputs. Pipe (`|`) is not a valid character in any of the scalar
//! fields it separates (namespaces/names are URL- or identifier-shaped,
//! timestamps are RFC3339, event types are a closed enum), so this is not a
//! general escaping scheme — it is a fixed, documented format that must never
//! be changed without a migration, since it is the sole collision key for
//! `job_runs` and `run_events`.

use sha2::{Digest, Sha256};

fn hex_sha256(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// `SHA-256(job.namespace ‖ "|" ‖ job.name ‖ "|" ‖ run.runID)`, hex-encoded.
///
/// This is the one scheme the canonicalizer implements (spec open question:
/// raw-concatenation vs. an alternative form — raw pipe-delimited
/// concatenation was chosen; never switch to a different form without
/// rehashing every stored `job_runs` row).
pub fn generate_job_run_id(job_namespace: &str, job_name: &str, run_id: &str) -> String {
    hex_sha256(&format!("{job_namespace}|{job_name}|{run_id}"))
}

/// `SHA-256(producer ‖ job.ns ‖ job.name ‖ runID ‖ eventTime(RFC3339Nano) ‖ eventType)`.
///
/// `event_time_rfc3339nano` MUST be formatted at nanosecond precision with an
/// explicit offset; truncating to seconds silently collapses the collision
/// resistance needed for rapid retries of the same run.
pub fn generate_idempotency_key(
    producer: &str,
    job_namespace: &str,
    job_name: &str,
    run_id: &str,
    event_time_rfc3339nano: &str,
    event_type: &str,
) -> String {
    hex_sha256(&format!(
        "{producer}|{job_namespace}|{job_name}|{run_id}|{event_time_rfc3339nano}|{event_type}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_run_id_is_64_char_lowercase_hex() {
        let id = generate_job_run_id("dbt://analytics", "orders", "R1");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn job_run_id_collapses_lifecycle_emissions_of_same_run() {
        // START/RUNNING/COMPLETE for the same run hash identically regardless
        // of which tool emits them, since eventType is not part of the input.
        let a = generate_job_run_id("dbt://analytics", "orders", "R1");
        let b = generate_job_run_id("dbt://analytics", "orders", "R1");
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_distinguishes_producers() {
        let a = generate_idempotency_key("dbt", "ns", "job", "R1", "2025-10-21T10:00:00.000000000Z", "START");
        let b = generate_idempotency_key("airflow", "ns", "job", "R1", "2025-10-21T10:00:00.000000000Z", "START");
        assert_ne!(a, b);
    }

    #[test]
    fn idempotency_key_distinguishes_timestamps() {
        let a = generate_idempotency_key("dbt", "ns", "job", "R1", "2025-10-21T10:00:00.000000000Z", "START");
        let b = generate_idempotency_key("dbt", "ns", "job", "R1", "2025-10-21T10:00:00.000000001Z", "START");
        assert_ne!(a, b);
    }

    #[test]
    fn idempotency_key_replays_collide() {
        let a = generate_idempotency_key("dbt", "ns", "job", "R1", "2025-10-21T10:00:00.000000000Z", "START");
        let b = generate_idempotency_key("dbt", "ns", "job", "R1", "2025-10-21T10:00:00.000000000Z", "START");
        assert_eq!(a, b);
    }
}
