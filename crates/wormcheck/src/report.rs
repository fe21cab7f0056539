//! Scenario reports in the Mint JSON log format.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::error::ScenarioError;

/// Final verdict of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Every assertion matched the oracle.
    #[serde(rename = "PASS")]
    Pass,
    /// An assertion mismatched, setup failed or the scenario timed out.
    #[serde(rename = "FAIL")]
    Fail,
    /// The endpoint does not support Object Lock.
    #[serde(rename = "NA")]
    Skipped,
}

/// One JSON report line.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// API signature under test.
    pub function: String,
    /// Arguments of the scenario (bucket name, object key).
    pub args: BTreeMap<String, String>,
    /// Wall-clock duration in milliseconds, cleanup excluded.
    pub duration: u64,
    /// Verdict.
    pub status: Verdict,
    /// Short classification of a failure or skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    /// Human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Full error detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioReport {
    /// Report for a passing scenario.
    pub fn pass(
        name: &str,
        function: &str,
        args: BTreeMap<String, String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            function: function.to_string(),
            args,
            duration: millis(elapsed),
            status: Verdict::Pass,
            alert: None,
            message: None,
            error: None,
        }
    }

    /// Report for a scenario that ended with `err`.
    pub fn from_error(
        name: &str,
        function: &str,
        args: BTreeMap<String, String>,
        elapsed: Duration,
        err: &ScenarioError,
    ) -> Self {
        let status = if err.is_skip() { Verdict::Skipped } else { Verdict::Fail };
        let error = match err {
            ScenarioError::Mismatch(m) => {
                format!("{}: expected {}, got {}\n{}", m.operation, m.expected, m.actual, m.model)
            }
            other => other.to_string(),
        };
        Self {
            name: name.to_string(),
            function: function.to_string(),
            args,
            duration: millis(elapsed),
            status,
            alert: Some(err.kind().to_string()),
            message: Some(err.to_string()),
            error: Some(error),
        }
    }

    /// Whether the scenario failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == Verdict::Fail
    }

    /// Serializes the report as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
