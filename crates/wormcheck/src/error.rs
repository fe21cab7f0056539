// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Scenario failure taxonomy.

use std::time::Duration;

use thiserror::Error;
use wormcheck_storage::StoreError;

/// Everything needed to diagnose an assertion mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// The request that was sent, e.g. `DeleteObject testObject@v2`.
    pub operation: String,
    /// What the oracle predicted.
    pub expected: String,
    /// What the server did.
    pub actual: String,
    /// Dump of the model state at the time of the request.
    pub model: String,
}

/// A scenario name that is not in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scenario: {0}")]
pub struct UnknownScenario(pub String);

/// Why a scenario did not pass.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Bucket creation failed for a reason other than missing Object Lock
    /// support.
    #[error("bucket setup failed: {0}")]
    Setup(StoreError),

    /// The endpoint does not implement Object Lock.
    #[error("object lock is not supported by the endpoint: {0}")]
    Unsupported(StoreError),

    /// The server's answer differs from the oracle's prediction.
    #[error("{}: expected {}, got {}", .0.operation, .0.expected, .0.actual)]
    Mismatch(Box<Mismatch>),

    /// Setup, uploads and assertions did not finish in time.
    #[error("scenario timed out after {0:?}")]
    Timeout(Duration),

    /// A network failure outside the assertions, e.g. during cleanup.
    #[error("transport error: {0}")]
    Transport(StoreError),

    /// Cleanup gave up while versions were still protected.
    #[error("cleanup of {bucket} gave up with {remaining} protected version(s) left")]
    CleanupIncomplete {
        /// Bucket that could not be emptied.
        bucket: String,
        /// Versions that could not be deleted.
        remaining: usize,
    },

    /// Cleanup failed with a service error.
    #[error("cleanup failed: {0}")]
    Cleanup(StoreError),
}

impl ScenarioError {
    /// Builds an assertion mismatch.
    pub fn mismatch(
        operation: impl ToString,
        expected: impl ToString,
        actual: impl ToString,
        model: impl ToString,
    ) -> Self {
        Self::Mismatch(Box::new(Mismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            model: model.to_string(),
        }))
    }

    /// Whether the error turns the scenario into a skip instead of a failure.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Short label for the taxonomy entry, used in reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Setup(_) => "SetupError",
            Self::Unsupported(_) => "UnsupportedFeature",
            Self::Mismatch(_) => "AssertionMismatch",
            Self::Timeout(_) => "Timeout",
            Self::Transport(_) => "TransportError",
            Self::CleanupIncomplete { .. } | Self::Cleanup(_) => "CleanupError",
        }
    }
}

#[cfg(test)]
mod tests {
    use wormcheck_core::S3ErrorCode;

    use super::*;

    #[test]
    fn test_mismatch_display() {
        let err = ScenarioError::mismatch(
            "DeleteObject testObject@v2",
            "DENY(governance retention requires bypass)",
            "ALLOW",
            "bucket b",
        );
        assert_eq!(
            err.to_string(),
            "DeleteObject testObject@v2: expected DENY(governance retention requires bypass), got ALLOW"
        );
        assert_eq!(err.kind(), "AssertionMismatch");
    }

    #[test]
    fn test_only_unsupported_skips() {
        let unsupported =
            ScenarioError::Unsupported(StoreError::service(S3ErrorCode::NotImplemented, "no"));
        assert!(unsupported.is_skip());
        assert!(!ScenarioError::Timeout(Duration::from_secs(60)).is_skip());
        assert!(!ScenarioError::Setup(StoreError::Transport("refused".into())).is_skip());
    }
}
