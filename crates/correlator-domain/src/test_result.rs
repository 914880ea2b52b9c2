//! Data-quality test result model (§3, `TestResult`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl TestStatus {
    /// Case-insensitive parse, per the test-result ingestor's mapping stage.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "passed" => Some(TestStatus::Passed),
            "failed" => Some(TestStatus::Failed),
            "error" => Some(TestStatus::Error),
            "skipped" => Some(TestStatus::Skipped),
            _ => None,
        }
    }
}

/// A single data-quality test outcome. Natural key: `(test_name, dataset_urn,
/// executed_at)` — the store UPSERTs on this triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub test_type: String,
    pub dataset_urn: String,
    pub job_run_id: Option<String>,
    pub status: TestStatus,
    pub message: Option<String>,
    #[serde(default = "Value::default")]
    pub metadata: Value,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
}

impl TestResult {
    pub fn natural_key(&self) -> (&str, &str, DateTime<Utc>) {
        (self.test_name.as_str(), self.dataset_urn.as_str(), self.executed_at)
    }
}
