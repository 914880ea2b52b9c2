//! Wire-shaped OpenLineage event DTOs and the mapping stage (spec §4.4.2).
//!
//! Every scalar is deserialized permissively (missing -> empty string) so
//! that "empty" and "missing" collapse onto the same validator check, and
//! every container coerces a missing array to `vec![]` rather than `None` —
//! the domain model never represents an absent-but-optional list.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use correlator_domain::{normalize_namespace, DatasetRef, EventType, JobRef, RunEvent, RunRef};

use crate::error::ValidationError;

#[derive(Debug, Default, Deserialize)]
struct WireDatasetRef {
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    name: String,
    #[serde(default = "Value::default")]
    facets: Value,
}

#[derive(Debug, Default, Deserialize)]
struct WireRunRef {
    #[serde(rename = "runId", default)]
    run_id: String,
    #[serde(default = "Value::default")]
    facets: Value,
}

#[derive(Debug, Default, Deserialize)]
struct WireJobRef {
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    name: String,
    #[serde(default = "Value::default")]
    facets: Value,
}

#[derive(Debug, Default, Deserialize)]
struct WireEvent {
    #[serde(rename = "eventTime", default)]
    event_time: String,
    #[serde(rename = "eventType", default)]
    event_type: String,
    #[serde(default)]
    producer: String,
    #[serde(rename = "schemaURL", default)]
    schema_url: String,
    #[serde(default)]
    run: WireRunRef,
    #[serde(default)]
    job: WireJobRef,
    #[serde(default)]
    inputs: Vec<WireDatasetRef>,
    #[serde(default)]
    outputs: Vec<WireDatasetRef>,
}

fn parse_event_type(raw: &str) -> Result<EventType, ValidationError> {
    match raw.trim().to_uppercase().as_str() {
        "START" => Ok(EventType::Start),
        "RUNNING" => Ok(EventType::Running),
        "COMPLETE" => Ok(EventType::Complete),
        "FAIL" => Ok(EventType::Fail),
        "ABORT" => Ok(EventType::Abort),
        "OTHER" => Ok(EventType::Other),
        other => Err(ValidationError::new("eventType", format!("not a recognized lifecycle state: '{other}'"))),
    }
}

fn parse_event_time(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    if raw.trim().is_empty() {
        // Sentinel: the "zero" eventTime the validator rejects. Missing and
        // zero collapse onto one check rather than two.
        return Ok(DateTime::<Utc>::from_timestamp(0, 0).unwrap());
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::new("eventTime", format!("not RFC3339: {e}")))
}

fn map_dataset(d: &WireDatasetRef) -> DatasetRef {
    let namespace =
        if d.namespace.trim().is_empty() { String::new() } else { normalize_namespace(&d.namespace) };
    DatasetRef { namespace, name: d.name.trim().to_string(), facets: d.facets.clone() }
}

/// Maps one wire-shaped JSON value to a domain [`RunEvent`].
///
/// Trims whitespace on scalar fields, re-normalizes dataset namespaces, and
/// coerces absent facet/input/output containers to empty-but-present, per
/// spec §4.4.2. A JSON `null` element or a shape serde cannot deserialize is
/// reported as the "event is absent" / malformed case from spec §4.2.
pub fn map_wire_event(value: &Value) -> Result<RunEvent, ValidationError> {
    if value.is_null() {
        return Err(ValidationError::new("event", "is absent"));
    }
    let wire: WireEvent =
        serde_json::from_value(value.clone()).map_err(|e| ValidationError::new("event", format!("malformed: {e}")))?;

    let event_type = parse_event_type(&wire.event_type)?;
    let event_time = parse_event_time(&wire.event_time)?;

    Ok(RunEvent {
        event_time,
        event_type,
        producer: wire.producer.trim().to_string(),
        schema_url: wire.schema_url.trim().to_string(),
        run: RunRef { run_id: wire.run.run_id.trim().to_string(), facets: wire.run.facets },
        job: JobRef {
            namespace: wire.job.namespace.trim().to_string(),
            name: wire.job.name.trim().to_string(),
            facets: wire.job.facets,
        },
        inputs: wire.inputs.iter().map(map_dataset).collect(),
        outputs: wire.outputs.iter().map(map_dataset).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_well_formed_wire_event() {
        let v = json!({
            "eventTime": "2025-10-21T10:00:00Z",
            "eventType": "start",
            "producer": " dbt ",
            "schemaURL": "https://openlineage.io/spec/2-0-2/OpenLineage.json",
            "run": {"runId": "R1"},
            "job": {"namespace": "Postgres://Host:5432", "name": "orders"},
        });
        let event = map_wire_event(&v).unwrap();
        assert_eq!(event.event_type, EventType::Start);
        assert_eq!(event.producer, "dbt");
        assert_eq!(event.inputs.len(), 0);
        assert_eq!(event.outputs.len(), 0);
    }

    #[test]
    fn rejects_null_event() {
        let err = map_wire_event(&Value::Null).unwrap_err();
        assert_eq!(err.field, "event");
    }

    #[test]
    fn rejects_unknown_event_type() {
        let v = json!({"eventType": "WEIRD"});
        let err = map_wire_event(&v).unwrap_err();
        assert_eq!(err.field, "eventType");
    }

    #[test]
    fn missing_inputs_outputs_default_to_empty_vec() {
        let v = json!({"eventType": "START"});
        let event = map_wire_event(&v).unwrap();
        assert_eq!(event.inputs.len(), 0);
        assert_eq!(event.outputs.len(), 0);
    }

    #[test]
    fn normalizes_dataset_namespace_on_inputs() {
        let v = json!({
            "eventType": "START",
            "inputs": [{"namespace": "Postgres://Host:5432", "name": "orders"}],
        });
        let event = map_wire_event(&v).unwrap();
        assert_eq!(event.inputs[0].namespace, "postgresql://host");
    }
}
