//! Structural/conformance validation (spec §4.2).
//!
//! Operates on already-mapped [`RunEvent`]s — by the time a validator sees
//! one, its `eventType` has already parsed to a closed enum (an unparseable
//! `eventType` is rejected during mapping, see `pipeline::map_wire_event`).
//! What's left to check here: emptiness of required scalars, the schema URL
//! format, and dataset reference shape.

use once_cell::sync::Lazy;
use regex::Regex;

use correlator_domain::{DatasetRef, RunEvent, TestResult};

use crate::error::ValidationError;

/// Compiled once per process, per spec §4.2.
static SCHEMA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://openlineage\.io/spec/\d+-\d+-\d+/OpenLineage\.json(#.*)?$").unwrap()
});

/// The regex already tolerates a trailing `#...` JSON-Schema fragment.
fn schema_url_matches(url: &str) -> bool {
    SCHEMA_URL_RE.is_match(url)
}

/// Checks the scalar fields every event must carry regardless of kind.
pub fn validate_base_event(event: &RunEvent) -> Result<(), ValidationError> {
    if event.event_time.timestamp_nanos_opt() == Some(0) {
        return Err(ValidationError::new("eventTime", "must be non-zero"));
    }
    if event.producer.trim().is_empty() {
        return Err(ValidationError::new("producer", "must not be empty"));
    }
    if event.schema_url.trim().is_empty() {
        return Err(ValidationError::new("schemaURL", "must not be empty"));
    }
    if !schema_url_matches(&event.schema_url) {
        return Err(ValidationError::new(
            "schemaURL",
            "must match ^https://openlineage.io/spec/<ver>/OpenLineage.json(#fragment)?$",
        ));
    }
    Ok(())
}

/// Checks one dataset reference's namespace/name.
pub fn validate_dataset(dataset: &DatasetRef, field_prefix: &str) -> Result<(), ValidationError> {
    if dataset.namespace.trim().is_empty() {
        return Err(ValidationError::new(format!("{field_prefix}.namespace"), "must not be empty"));
    }
    if dataset.name.trim().is_empty() {
        return Err(ValidationError::new(format!("{field_prefix}.name"), "must not be empty"));
    }
    Ok(())
}

/// Full structural validation of one run event: base fields, run/job
/// identity, and every input/output dataset reference.
pub fn validate_run_event(event: &RunEvent) -> Result<(), ValidationError> {
    validate_base_event(event)?;
    if event.run.run_id.trim().is_empty() {
        return Err(ValidationError::new("run.runID", "must not be empty"));
    }
    if event.job.namespace.trim().is_empty() {
        return Err(ValidationError::new("job.namespace", "must not be empty"));
    }
    if event.job.name.trim().is_empty() {
        return Err(ValidationError::new("job.name", "must not be empty"));
    }
    for (idx, input) in event.inputs.iter().enumerate() {
        validate_dataset(input, &format!("inputs[{idx}]"))?;
    }
    for (idx, output) in event.outputs.iter().enumerate() {
        validate_dataset(output, &format!("outputs[{idx}]"))?;
    }
    Ok(())
}

/// Structural validation for an ingested [`TestResult`]: dataset URN and test
/// name must be present; status is already a closed enum by the time mapping
/// hands this to the validator.
pub fn validate_test_result(result: &TestResult) -> Result<(), ValidationError> {
    if result.test_name.trim().is_empty() {
        return Err(ValidationError::new("testName", "must not be empty"));
    }
    if result.dataset_urn.trim().is_empty() {
        return Err(ValidationError::new("datasetURN", "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use correlator_domain::{EventType, JobRef, RunRef};

    fn valid_event() -> RunEvent {
        RunEvent {
            event_time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            event_type: EventType::Start,
            producer: "dbt".into(),
            schema_url: "https://openlineage.io/spec/2-0-2/OpenLineage.json".into(),
            run: RunRef { run_id: "R1".into(), facets: serde_json::Value::default() },
            job: JobRef { namespace: "dbt://analytics".into(), name: "orders".into(), facets: serde_json::Value::default() },
            inputs: vec![],
            outputs: vec![],
        }
    }

    #[test]
    fn accepts_well_formed_event() {
        assert!(validate_run_event(&valid_event()).is_ok());
    }

    #[test]
    fn rejects_empty_job_name() {
        let mut e = valid_event();
        e.job.name = "  ".into();
        let err = validate_run_event(&e).unwrap_err();
        assert_eq!(err.field, "job.name");
    }

    #[test]
    fn accepts_schema_url_with_fragment() {
        let mut e = valid_event();
        e.schema_url = "https://openlineage.io/spec/2-0-2/OpenLineage.json#/$defs/RunEvent".into();
        assert!(validate_run_event(&e).is_ok());
    }

    #[test]
    fn rejects_non_conforming_schema_url() {
        let mut e = valid_event();
        e.schema_url = "https://example.com/schema.json".into();
        let err = validate_run_event(&e).unwrap_err();
        assert_eq!(err.field, "schemaURL");
    }

    #[test]
    fn rejects_empty_dataset_name() {
        let mut e = valid_event();
        e.outputs.push(DatasetRef { namespace: "dbt://analytics".into(), name: "".into(), facets: serde_json::Value::default() });
        let err = validate_run_event(&e).unwrap_err();
        assert_eq!(err.field, "outputs[0].name");
    }

    #[test]
    fn unknown_facets_are_accepted() {
        let mut e = valid_event();
        e.job.facets = serde_json::json!({"anything": "goes"});
        assert!(validate_run_event(&e).is_ok());
    }
}
