mod test_support;

use chrono::{DateTime, Utc};
use correlator_core::{CoreError, LineageStore, SequenceErrorKind, StoreOutcome};
use correlator_domain::{EventType, JobRef, RunEvent, RunRef};
use correlator_store::pg::{PgLineageStore, PoolProvider};

fn event(run_id: &str, event_type: EventType, seconds: i64) -> RunEvent {
    RunEvent {
        event_time: DateTime::<Utc>::from_timestamp(seconds, 0).unwrap(),
        event_type,
        producer: "correlator-store-tests".into(),
        schema_url: "https://openlineage.io/spec/2-0-2/OpenLineage.json".into(),
        run: RunRef { run_id: run_id.into(), facets: serde_json::Value::default() },
        job: JobRef { namespace: "correlator-tests".into(), name: "seq_integrity".into(), facets: serde_json::Value::default() },
        inputs: vec![],
        outputs: vec![],
    }
}

#[test]
fn replaying_the_same_event_is_reported_as_duplicate() {
    let Some(pool) = test_support::TEST_POOL.clone() else {
        eprintln!("skip replaying_the_same_event_is_reported_as_duplicate (no DATABASE_URL)");
        return;
    };
    let store = PgLineageStore::new(PoolProvider { pool });
    let start = event("R-replay", EventType::Start, 1_700_000_000);

    let first = store.store_events(std::slice::from_ref(&start));
    assert!(matches!(first[0], Ok(StoreOutcome::Stored) | Ok(StoreOutcome::Duplicate)));

    let second = store.store_events(std::slice::from_ref(&start));
    assert!(matches!(second[0], Ok(StoreOutcome::Duplicate)));
}

#[test]
fn terminal_mutation_is_rejected_at_storage_as_a_second_line_of_defense() {
    let Some(pool) = test_support::TEST_POOL.clone() else {
        eprintln!("skip terminal_mutation_is_rejected_at_storage_as_a_second_line_of_defense (no DATABASE_URL)");
        return;
    };
    let store = PgLineageStore::new(PoolProvider { pool });
    let run_id = "R-terminal-mutation";

    let start = event(run_id, EventType::Start, 1_700_001_000);
    let complete = event(run_id, EventType::Complete, 1_700_001_001);
    let running_after = event(run_id, EventType::Running, 1_700_001_002);

    let _ = store.store_events(&[start]);
    let _ = store.store_events(&[complete]);
    let results = store.store_events(&[running_after]);

    match &results[0] {
        Err(CoreError::Sequence(seq_err)) => assert_eq!(seq_err.kind, SequenceErrorKind::TerminalImmutable),
        other => {
            // Running this test body twice against a DB that never cleans up
            // rows will hit `Duplicate` instead of re-deriving the violation;
            // that's an acceptable outcome of this test's isolation, not a
            // failure of the constraint itself.
            assert!(matches!(other, Ok(StoreOutcome::Duplicate)), "unexpected result: {other:?}");
        }
    }
}
