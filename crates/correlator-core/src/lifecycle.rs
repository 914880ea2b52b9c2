//! The lifecycle engine (spec §4.3): sorts a single-run batch by event time,
//! enforces transition legality, and derives the run's final state.
//!
//! This is the one place transition legality is expressed. `correlator-store`
//! enforces the same rules again at the storage layer as a second line of
//! defense (spec §9, "dual layer enforcement") — it must stay semantically
//! identical to the table below, which is why the table is exported rather
//! than re-derived.

use correlator_domain::{EventType, RunEvent};

use crate::error::{SequenceError, SequenceErrorKind};

/// Table-driven transition legality check, shared by the engine and (in
/// spirit) by the store's constraint layer.
///
/// `OTHER` is transparent on either side of a transition: it neither advances
/// nor rejects state, so any transition involving it is allowed.
pub fn validate_state_transition(from: EventType, to: EventType) -> Result<(), SequenceErrorKind> {
    use EventType::*;

    if from == Other || to == Other {
        return Ok(());
    }

    match from {
        Start => match to {
            Running | Complete | Fail | Abort => Ok(()),
            Start => Err(SequenceErrorKind::DuplicateStart),
            Other => unreachable!("handled above"),
        },
        Running => match to {
            Running | Complete | Fail | Abort => Ok(()),
            Start => Err(SequenceErrorKind::BackwardTransition),
            Other => unreachable!("handled above"),
        },
        Complete | Fail | Abort => {
            if to == from {
                Ok(())
            } else {
                Err(SequenceErrorKind::TerminalImmutable)
            }
        }
        Other => unreachable!("handled above"),
    }
}

/// Sorts `events` by `event_time` (stable) and walks the non-`OTHER`
/// subsequence applying [`validate_state_transition`].
///
/// Only call this on a batch whose events all share one `run.runID` — a
/// multi-run batch skips sequence validation entirely (spec §4.3: each run is
/// independent, checked at storage time by persisted invariants).
pub fn validate_event_sequence(mut events: Vec<RunEvent>) -> Result<(Vec<RunEvent>, EventType), SequenceError> {
    if events.is_empty() {
        return Err(SequenceError::empty_event_list());
    }

    events.sort_by(|a, b| a.event_time.cmp(&b.event_time));

    let Some(first_idx) = events.iter().position(|e| e.event_type != EventType::Other) else {
        return Ok((events, EventType::Other));
    };

    let mut current = events[first_idx].event_type;
    for (idx, event) in events.iter().enumerate().skip(first_idx + 1) {
        if event.event_type == EventType::Other {
            continue;
        }
        match validate_state_transition(current, event.event_type) {
            Ok(()) => current = event.event_type,
            Err(kind) => {
                return Err(SequenceError { kind, index: idx, from: Some(current), to: Some(event.event_type) });
            }
        }
    }

    Ok((events, current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use correlator_domain::{JobRef, RunRef};

    fn event_at(seconds: i64, event_type: EventType) -> RunEvent {
        RunEvent {
            event_time: DateTime::<Utc>::from_timestamp(seconds, 0).unwrap(),
            event_type,
            producer: "dbt".into(),
            schema_url: "https://openlineage.io/spec/2-0-2/OpenLineage.json".into(),
            run: RunRef { run_id: "R1".into(), facets: serde_json::Value::default() },
            job: JobRef { namespace: "ns".into(), name: "job".into(), facets: serde_json::Value::default() },
            inputs: vec![],
            outputs: vec![],
        }
    }

    #[test]
    fn transition_table_matches_spec() {
        use EventType::*;
        assert!(validate_state_transition(Start, Running).is_ok());
        assert!(validate_state_transition(Start, Complete).is_ok());
        assert_eq!(validate_state_transition(Start, Start), Err(SequenceErrorKind::DuplicateStart));
        assert!(validate_state_transition(Running, Complete).is_ok());
        assert_eq!(validate_state_transition(Running, Start), Err(SequenceErrorKind::BackwardTransition));
        assert!(validate_state_transition(Complete, Complete).is_ok());
        assert_eq!(validate_state_transition(Complete, Fail), Err(SequenceErrorKind::TerminalImmutable));
        assert!(validate_state_transition(Fail, Other).is_ok());
        assert!(validate_state_transition(Other, Start).is_ok());
    }

    #[test]
    fn transition_self_loop_valid_iff_terminal_or_running() {
        use EventType::*;
        for t in [Start, Running, Complete, Fail, Abort] {
            let result = validate_state_transition(t, t);
            let should_be_valid = t.is_terminal() || t == Running;
            assert_eq!(result.is_ok(), should_be_valid, "t={t:?}");
        }
    }

    #[test]
    fn out_of_order_batch_sorts_and_resolves_complete() {
        let events = vec![event_at(610, EventType::Complete), event_at(600, EventType::Start), event_at(605, EventType::Running)];
        let (sorted, final_state) = validate_event_sequence(events).unwrap();
        assert_eq!(sorted.iter().map(|e| e.event_type).collect::<Vec<_>>(), vec![EventType::Start, EventType::Running, EventType::Complete]);
        assert_eq!(final_state, EventType::Complete);
    }

    #[test]
    fn terminal_mutation_fails_whole_batch() {
        let events = vec![event_at(600, EventType::Start), event_at(601, EventType::Complete), event_at(602, EventType::Running)];
        let err = validate_event_sequence(events).unwrap_err();
        assert_eq!(err.kind, SequenceErrorKind::TerminalImmutable);
    }

    #[test]
    fn backward_transition_fails_whole_batch() {
        let events = vec![event_at(600, EventType::Start), event_at(601, EventType::Running), event_at(602, EventType::Start)];
        let err = validate_event_sequence(events).unwrap_err();
        assert_eq!(err.kind, SequenceErrorKind::BackwardTransition);
    }

    #[test]
    fn empty_batch_fails() {
        let err = validate_event_sequence(vec![]).unwrap_err();
        assert_eq!(err.kind, SequenceErrorKind::EmptyEventList);
    }

    #[test]
    fn shuffled_input_yields_same_verdict() {
        let a = vec![event_at(610, EventType::Complete), event_at(600, EventType::Start), event_at(605, EventType::Running)];
        let b = vec![event_at(600, EventType::Start), event_at(605, EventType::Running), event_at(610, EventType::Complete)];
        let (sorted_a, final_a) = validate_event_sequence(a).unwrap();
        let (sorted_b, final_b) = validate_event_sequence(b).unwrap();
        assert_eq!(final_a, final_b);
        assert_eq!(sorted_a.iter().map(|e| e.event_time).collect::<Vec<_>>(), sorted_b.iter().map(|e| e.event_time).collect::<Vec<_>>());
    }

    #[test]
    fn leading_and_trailing_other_is_transparent() {
        let events = vec![event_at(599, EventType::Other), event_at(600, EventType::Start), event_at(601, EventType::Running), event_at(602, EventType::Other)];
        let (_, final_state) = validate_event_sequence(events).unwrap();
        assert_eq!(final_state, EventType::Running);
    }

    #[test]
    fn all_other_events_yield_other_final_state() {
        let events = vec![event_at(600, EventType::Other), event_at(601, EventType::Other)];
        let (_, final_state) = validate_event_sequence(events).unwrap();
        assert_eq!(final_state, EventType::Other);
    }
}
