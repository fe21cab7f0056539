// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Scenario definitions and the built-in catalogue.
//!
//! A scenario is data: a list of fixtures that populate the bucket and a list
//! of steps to assert on. Dates are offsets from an anchor the driver takes
//! (truncated to whole seconds) right before the first fixture, so every
//! scenario is independent of when it runs. Steps refer to versions by the
//! index of the fixture that created them.

use chrono::{DateTime, Duration, Utc};
use wormcheck_core::{ObjectLock, RetentionMode, RetentionRecord};

use crate::error::UnknownScenario;

/// Key every built-in scenario writes to.
pub const OBJECT_KEY: &str = "testObject";

/// A retention expressed relative to the scenario anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSpec {
    /// Lock mode.
    pub mode: RetentionMode,
    /// Retain-until date minus the anchor.
    pub after: Duration,
}

impl LockSpec {
    /// GOVERNANCE retention for `after` past the anchor.
    #[must_use]
    pub const fn governance(after: Duration) -> Self {
        Self { mode: RetentionMode::Governance, after }
    }

    /// COMPLIANCE retention for `after` past the anchor.
    #[must_use]
    pub const fn compliance(after: Duration) -> Self {
        Self { mode: RetentionMode::Compliance, after }
    }

    /// Resolves the lock against an anchor.
    #[must_use]
    pub fn resolve(&self, anchor: DateTime<Utc>) -> ObjectLock {
        ObjectLock::new(self.mode, anchor + self.after)
    }
}

/// Something that creates a version before the assertions start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fixture {
    /// Single PutObject.
    Put {
        /// Object key.
        key: String,
        /// Write-time lock.
        lock: Option<LockSpec>,
    },
    /// Multipart upload of `run.object_size` bytes in `run.part_size` parts.
    Multipart {
        /// Object key.
        key: String,
        /// Lock given at CreateMultipartUpload.
        lock: Option<LockSpec>,
    },
    /// Unversioned DeleteObject, leaving a delete marker.
    DeleteMarker {
        /// Object key.
        key: String,
    },
}

impl Fixture {
    /// Object key the fixture writes.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Multipart { key, .. } | Self::DeleteMarker { key } => key,
        }
    }

    fn put(lock: Option<LockSpec>) -> Self {
        Self::Put { key: OBJECT_KEY.to_string(), lock }
    }

    fn multipart(lock: Option<LockSpec>) -> Self {
        Self::Multipart { key: OBJECT_KEY.to_string(), lock }
    }

    fn delete_marker() -> Self {
        Self::DeleteMarker { key: OBJECT_KEY.to_string() }
    }
}

/// One asserted request. `fixture` is the index of the fixture whose
/// version the request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Versioned DeleteObject.
    Delete {
        /// Target fixture.
        fixture: usize,
        /// Send the governance bypass header.
        bypass: bool,
    },
    /// PutObjectRetention. `mode: None` with `after: None` clears.
    PutRetention {
        /// Target fixture.
        fixture: usize,
        /// Proposed mode.
        mode: RetentionMode,
        /// Proposed retain-until date minus the anchor.
        after: Option<Duration>,
        /// Send the governance bypass header.
        bypass: bool,
    },
    /// GetObjectRetention, twice, compared with the model.
    VerifyRetention {
        /// Target fixture.
        fixture: usize,
    },
    /// PutObjectLegalHold.
    PutLegalHold {
        /// Target fixture.
        fixture: usize,
        /// ON or OFF.
        on: bool,
    },
}

impl Step {
    /// Index of the fixture the step targets.
    #[must_use]
    pub const fn fixture(&self) -> usize {
        match self {
            Self::Delete { fixture, .. }
            | Self::PutRetention { fixture, .. }
            | Self::VerifyRetention { fixture }
            | Self::PutLegalHold { fixture, .. } => *fixture,
        }
    }

    /// Proposed retention for [`Step::PutRetention`], resolved against the anchor.
    #[must_use]
    pub fn proposed_retention(&self, anchor: DateTime<Utc>) -> Option<RetentionRecord> {
        match self {
            Self::PutRetention { mode, after, .. } => {
                Some(RetentionRecord::proposed(*mode, after.map(|d| anchor + d)))
            }
            _ => None,
        }
    }

    fn delete(fixture: usize, bypass: bool) -> Self {
        Self::Delete { fixture, bypass }
    }

    fn retention(fixture: usize, lock: LockSpec, bypass: bool) -> Self {
        Self::PutRetention { fixture, mode: lock.mode, after: Some(lock.after), bypass }
    }

    fn clear(fixture: usize, bypass: bool) -> Self {
        Self::PutRetention { fixture, mode: RetentionMode::None, after: None, bypass }
    }
}

/// A named end-to-end check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Catalogue name, e.g. `retention_governance`.
    pub name: String,
    /// API signature reported in the Mint `function` field.
    pub function: String,
    /// One-line description for `wormcheck list`.
    pub description: String,
    /// Versions created before the assertions.
    pub fixtures: Vec<Fixture>,
    /// Asserted requests, in order.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Creates an empty scenario.
    pub fn new(
        name: impl Into<String>,
        function: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            description: description.into(),
            fixtures: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Appends a fixture.
    #[must_use]
    pub fn fixture(mut self, fixture: Fixture) -> Self {
        self.fixtures.push(fixture);
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Whether any fixture is a multipart upload.
    #[must_use]
    pub fn uses_multipart(&self) -> bool {
        self.fixtures.iter().any(|f| matches!(f, Fixture::Multipart { .. }))
    }
}

const PUT_FUNCTION: &str = "PutObject(bucketName, objectName, reader, size, opts)";
const RETENTION_FUNCTION: &str =
    "PutObjectRetention(bucketName, objectName, opts) / GetObjectRetention(bucketName, objectName, versionID)";

/// Every built-in scenario, in execution order.
#[must_use]
pub fn catalogue() -> Vec<Scenario> {
    let hour = Duration::hours(1);
    let minute = Duration::minutes(1);
    let two_minutes = Duration::minutes(2);

    vec![
        Scenario::new(
            "retention_governance",
            PUT_FUNCTION,
            "GOVERNANCE version among plain versions and a delete marker",
        )
        .fixture(Fixture::put(None))
        .fixture(Fixture::put(Some(LockSpec::governance(hour))))
        .fixture(Fixture::put(None))
        .fixture(Fixture::delete_marker())
        .step(Step::delete(0, false))
        .step(Step::delete(1, false))
        .step(Step::delete(2, false))
        .step(Step::delete(3, false))
        .step(Step::delete(1, true)),
        Scenario::new(
            "retention_governance_multipart",
            "NewMultipartUpload(bucketName, objectName, opts) / PutObjectPart / CompleteMultipartUpload",
            "GOVERNANCE lock given at multipart creation applies to the assembled object",
        )
        .fixture(Fixture::multipart(Some(LockSpec::governance(hour))))
        .step(Step::VerifyRetention { fixture: 0 })
        .step(Step::delete(0, false))
        .step(Step::delete(0, true)),
        Scenario::new(
            "retention_compliance",
            PUT_FUNCTION,
            "COMPLIANCE version cannot be deleted, even with bypass",
        )
        .fixture(Fixture::put(None))
        .fixture(Fixture::put(Some(LockSpec::compliance(minute))))
        .fixture(Fixture::put(None))
        .fixture(Fixture::delete_marker())
        .step(Step::delete(0, false))
        .step(Step::delete(1, false))
        .step(Step::delete(1, true))
        .step(Step::delete(2, false))
        .step(Step::delete(3, false)),
        Scenario::new(
            "put_get_delete_retention_governance",
            RETENTION_FUNCTION,
            "GOVERNANCE retention extends, refuses reduction, clears only with bypass",
        )
        .fixture(Fixture::put(Some(LockSpec::governance(minute))))
        .step(Step::retention(0, LockSpec::governance(two_minutes), false))
        .step(Step::VerifyRetention { fixture: 0 })
        .step(Step::retention(0, LockSpec::governance(minute), false))
        .step(Step::clear(0, false))
        .step(Step::clear(0, true))
        .step(Step::VerifyRetention { fixture: 0 })
        .step(Step::delete(0, false)),
        Scenario::new(
            "put_get_retention_compliance",
            RETENTION_FUNCTION,
            "COMPLIANCE retention extends but can be neither reduced nor cleared",
        )
        .fixture(Fixture::put(Some(LockSpec::compliance(minute))))
        .step(Step::retention(0, LockSpec::compliance(two_minutes), false))
        .step(Step::VerifyRetention { fixture: 0 })
        .step(Step::retention(0, LockSpec::compliance(minute), false))
        .step(Step::clear(0, false))
        .step(Step::clear(0, true))
        .step(Step::delete(0, true)),
        Scenario::new(
            "legal_hold_blocks_delete",
            "PutObjectLegalHold(bucketName, objectName, opts)",
            "A legal hold blocks deletion even with governance bypass",
        )
        .fixture(Fixture::put(None))
        .step(Step::PutLegalHold { fixture: 0, on: true })
        .step(Step::delete(0, true))
        .step(Step::PutLegalHold { fixture: 0, on: false })
        .step(Step::delete(0, false)),
    ]
}

/// Looks up built-in scenarios by name, keeping catalogue order.
///
/// # Errors
///
/// Returns [`UnknownScenario`] for the first name not in the catalogue.
pub fn select(names: &[String]) -> Result<Vec<Scenario>, UnknownScenario> {
    let all = catalogue();
    if let Some(unknown) = names.iter().find(|n| !all.iter().any(|s| &s.name == *n)) {
        return Err(UnknownScenario(unknown.clone()));
    }
    if names.is_empty() {
        return Ok(all);
    }
    Ok(all.into_iter().filter(|s| names.contains(&s.name)).collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_catalogue_is_well_formed() {
        let all = catalogue();
        let names: HashSet<_> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), all.len(), "scenario names must be unique");

        for scenario in &all {
            assert!(!scenario.fixtures.is_empty(), "{}", scenario.name);
            assert!(!scenario.steps.is_empty(), "{}", scenario.name);
            for step in &scenario.steps {
                assert!(step.fixture() < scenario.fixtures.len(), "{}: {step:?}", scenario.name);
            }
        }
    }

    #[test]
    fn test_catalogue_covers_markers_and_multipart() {
        let markers = catalogue()
            .iter()
            .filter(|s| s.fixtures.iter().any(|f| matches!(f, Fixture::DeleteMarker { .. })))
            .count();
        assert!(markers >= 1);
        assert!(catalogue().iter().any(Scenario::uses_multipart));
    }

    #[test]
    fn test_select() {
        assert_eq!(select(&[]).unwrap().len(), catalogue().len());

        let wanted = ["retention_compliance".to_string(), "retention_governance".to_string()];
        let picked = select(&wanted).unwrap();
        let names: Vec<_> = picked.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["retention_governance", "retention_compliance"]);

        let err = select(&["nope".to_string()]).unwrap_err();
        assert_eq!(err, UnknownScenario("nope".to_string()));
        assert_eq!(err.to_string(), "unknown scenario: nope");
    }

    #[test]
    fn test_offsets_resolve_against_anchor() {
        let anchor = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let lock = LockSpec::governance(Duration::minutes(1)).resolve(anchor);
        assert_eq!(lock.retain_until, anchor + Duration::minutes(1));

        let clear = Step::clear(0, true).proposed_retention(anchor).unwrap();
        assert_eq!(clear, RetentionRecord::none());
        assert!(Step::delete(0, true).proposed_retention(anchor).is_none());
    }
}
