// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Object Lock retention model.
//!
//! Pure transition rules for a single retention record. Nothing here touches
//! the network or reads the clock: every time-dependent rule takes `now`
//! explicitly so callers (and tests) control expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::S3ErrorCode;
use crate::types::{truncate_to_seconds, ObjectLock, RetentionMode};

/// Why an object-lock operation must be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    /// The retention request itself is malformed or not applicable.
    #[error("invalid retention: {0}")]
    InvalidRetention(String),

    /// A put-retention would move the retain-until date backwards.
    #[error("retain-until date not extended: {proposed} is not after {current}")]
    RetentionNotExtended {
        /// Date currently protecting the version.
        current: DateTime<Utc>,
        /// Date that was proposed.
        proposed: DateTime<Utc>,
    },

    /// GOVERNANCE protection can only be lifted with the bypass flag.
    #[error("governance retention requires bypass")]
    GovernanceBypassRequired,

    /// COMPLIANCE protection cannot be lifted before it expires.
    #[error("compliance retention is immutable until {until}")]
    ComplianceImmutable {
        /// Expiry of the compliance retention.
        until: DateTime<Utc>,
    },

    /// A legal hold blocks deletion regardless of retention or bypass.
    #[error("legal hold is active")]
    LegalHoldActive,

    /// The referenced version does not exist.
    #[error("no such version: {0}")]
    NoSuchVersion(String),

    /// The version has no retention to report.
    #[error("version has no retention configuration")]
    NoRetention,
}

impl DenyReason {
    /// Error codes a conforming server may answer with for this denial.
    ///
    /// Servers disagree on the exact code for most lock violations, so each
    /// reason lists every code observed in the wild.
    #[must_use]
    pub fn accepted_codes(&self) -> &'static [S3ErrorCode] {
        match self {
            Self::InvalidRetention(_) => &[
                S3ErrorCode::InvalidRequest,
                S3ErrorCode::InvalidArgument,
                S3ErrorCode::MalformedXML,
                S3ErrorCode::MethodNotAllowed,
            ],
            Self::RetentionNotExtended { .. } => &[
                S3ErrorCode::AccessDenied,
                S3ErrorCode::InvalidRequest,
                S3ErrorCode::InvalidArgument,
            ],
            Self::GovernanceBypassRequired
            | Self::ComplianceImmutable { .. }
            | Self::LegalHoldActive => &[S3ErrorCode::AccessDenied],
            Self::NoSuchVersion(_) => &[S3ErrorCode::NoSuchVersion, S3ErrorCode::NoSuchKey],
            Self::NoRetention => &[
                S3ErrorCode::NoSuchObjectLockConfiguration,
                S3ErrorCode::ObjectLockConfigurationNotFoundError,
            ],
        }
    }

    /// Whether this denial comes from a permission rule rather than from the
    /// request being invalid or out of order.
    #[must_use]
    pub const fn is_permission(&self) -> bool {
        matches!(
            self,
            Self::GovernanceBypassRequired
                | Self::ComplianceImmutable { .. }
                | Self::LegalHoldActive
        )
    }
}

/// Retention attached to one object version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetentionRecord {
    /// Lock mode.
    pub mode: RetentionMode,
    /// Retain-until date. Present iff `mode` is locking.
    pub retain_until: Option<DateTime<Utc>>,
}

impl RetentionRecord {
    /// The empty record: no mode, no date.
    #[must_use]
    pub const fn none() -> Self {
        Self { mode: RetentionMode::None, retain_until: None }
    }

    /// Builds a record without validating it.
    ///
    /// Used to describe a *proposed* retention before it goes through
    /// [`RetentionRecord::apply`] or [`RetentionRecord::update`].
    #[must_use]
    pub fn proposed(mode: RetentionMode, retain_until: Option<DateTime<Utc>>) -> Self {
        Self { mode, retain_until: retain_until.map(truncate_to_seconds) }
    }

    /// Constructs a validated record.
    ///
    /// # Errors
    ///
    /// Returns [`DenyReason::InvalidRetention`] if a locking mode has no date,
    /// if a date is given without a locking mode, or if the date is not
    /// strictly after `now`.
    pub fn apply(
        mode: RetentionMode,
        retain_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, DenyReason> {
        let retain_until = retain_until.map(truncate_to_seconds);
        match (mode.is_locking(), retain_until) {
            (false, None) => Ok(Self::none()),
            (false, Some(_)) => Err(DenyReason::InvalidRetention(
                "retain-until date given without a retention mode".to_string(),
            )),
            (true, None) => Err(DenyReason::InvalidRetention(format!(
                "{mode} retention requires a retain-until date"
            ))),
            (true, Some(until)) if until <= now => Err(DenyReason::InvalidRetention(format!(
                "retain-until date {until} is not in the future"
            ))),
            (true, Some(until)) => Ok(Self { mode, retain_until: Some(until) }),
        }
    }

    /// Same as [`RetentionRecord::apply`] for a write-time lock request.
    ///
    /// # Errors
    ///
    /// See [`RetentionRecord::apply`].
    pub fn from_lock(lock: &ObjectLock, now: DateTime<Utc>) -> Result<Self, DenyReason> {
        Self::apply(lock.mode, Some(lock.retain_until), now)
    }

    /// Moves the retain-until date forward.
    ///
    /// # Errors
    ///
    /// Returns [`DenyReason::RetentionNotExtended`] unless `new_until` is
    /// strictly after the current date, and [`DenyReason::InvalidRetention`]
    /// if the record has no date to extend.
    pub fn extend(&self, new_until: DateTime<Utc>) -> Result<Self, DenyReason> {
        let new_until = truncate_to_seconds(new_until);
        let current = self.retain_until.ok_or_else(|| {
            DenyReason::InvalidRetention("record has no retain-until date to extend".to_string())
        })?;
        if new_until > current {
            Ok(Self { mode: self.mode, retain_until: Some(new_until) })
        } else {
            Err(DenyReason::RetentionNotExtended { current, proposed: new_until })
        }
    }

    /// Removes the retention.
    ///
    /// # Errors
    ///
    /// GOVERNANCE without `bypass` fails with
    /// [`DenyReason::GovernanceBypassRequired`]; COMPLIANCE fails with
    /// [`DenyReason::ComplianceImmutable`] until it has expired.
    pub fn clear(&self, bypass: bool, now: DateTime<Utc>) -> Result<(), DenyReason> {
        if !self.is_active(now) {
            return Ok(());
        }
        match self.mode {
            RetentionMode::None => Ok(()),
            RetentionMode::Governance if bypass => Ok(()),
            RetentionMode::Governance => Err(DenyReason::GovernanceBypassRequired),
            RetentionMode::Compliance => Err(self.compliance_denial()),
        }
    }

    /// Applies a put-retention request to this record.
    ///
    /// Combines [`RetentionRecord::clear`], [`RetentionRecord::extend`] and
    /// [`RetentionRecord::apply`]: clearing follows the clear rules, a later
    /// or equal date is accepted, an earlier date only under GOVERNANCE with
    /// bypass, and COMPLIANCE can never be downgraded to GOVERNANCE while it
    /// is active. An expired record protects nothing.
    ///
    /// # Errors
    ///
    /// Returns the [`DenyReason`] of the first rule the request violates.
    pub fn update(
        &self,
        proposed: &RetentionRecord,
        bypass: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, DenyReason> {
        if !self.is_active(now) {
            return Self::apply(proposed.mode, proposed.retain_until, now);
        }
        if !proposed.mode.is_locking() {
            if proposed.retain_until.is_some() {
                return Self::apply(proposed.mode, proposed.retain_until, now);
            }
            self.clear(bypass, now)?;
            return Ok(Self::none());
        }

        let candidate = Self::apply(proposed.mode, proposed.retain_until, now)?;
        if self.mode == RetentionMode::Compliance && candidate.mode == RetentionMode::Governance {
            return Err(self.compliance_denial());
        }

        let (Some(current), Some(new_until)) = (self.retain_until, candidate.retain_until) else {
            return Ok(candidate);
        };
        if new_until == current {
            return Ok(candidate);
        }
        match self.extend(new_until) {
            Ok(_) => Ok(candidate),
            Err(_) if self.mode == RetentionMode::Governance && bypass => Ok(candidate),
            Err(e) => Err(e),
        }
    }

    /// Whether the record currently protects its version.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.mode.is_locking() && self.retain_until.is_some_and(|until| until > now)
    }

    /// Checks whether a versioned delete may remove the protected version.
    ///
    /// # Errors
    ///
    /// Same denials as [`RetentionRecord::clear`].
    pub fn permits_delete(&self, bypass: bool, now: DateTime<Utc>) -> Result<(), DenyReason> {
        self.clear(bypass, now)
    }

    fn compliance_denial(&self) -> DenyReason {
        let until = self.retain_until.unwrap_or(DateTime::<Utc>::MIN_UTC);
        DenyReason::ComplianceImmutable { until }
    }
}

impl std::fmt::Display for RetentionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.retain_until {
            Some(until) => write!(f, "{} until {}", self.mode, until.to_rfc3339()),
            None => write!(f, "{}", self.mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(mode: RetentionMode, minutes: i64) -> RetentionRecord {
        RetentionRecord::apply(mode, Some(now() + Duration::minutes(minutes)), now()).unwrap()
    }

    #[test]
    fn test_apply_requires_future_date() {
        let err =
            RetentionRecord::apply(RetentionMode::Governance, Some(now()), now()).unwrap_err();
        assert!(matches!(err, DenyReason::InvalidRetention(_)));

        let err = RetentionRecord::apply(
            RetentionMode::Compliance,
            Some(now() - Duration::seconds(1)),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, DenyReason::InvalidRetention(_)));
    }

    #[test]
    fn test_apply_requires_date_for_locking_mode() {
        for mode in [RetentionMode::Governance, RetentionMode::Compliance] {
            let err = RetentionRecord::apply(mode, None, now()).unwrap_err();
            assert!(matches!(err, DenyReason::InvalidRetention(_)));
        }
        let later = Some(now() + Duration::hours(1));
        let err = RetentionRecord::apply(RetentionMode::None, later, now()).unwrap_err();
        assert!(matches!(err, DenyReason::InvalidRetention(_)));
        assert_eq!(
            RetentionRecord::apply(RetentionMode::None, None, now()),
            Ok(RetentionRecord::none())
        );
    }

    #[test]
    fn test_extend_only_forward() {
        let rec = record(RetentionMode::Governance, 1);
        let later = now() + Duration::minutes(2);
        assert_eq!(rec.extend(later).unwrap().retain_until, Some(later));

        let err = rec.extend(now() + Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, DenyReason::RetentionNotExtended { .. }));
        assert!(!err.is_permission());

        let err = rec.extend(now() + Duration::seconds(30)).unwrap_err();
        assert!(matches!(err, DenyReason::RetentionNotExtended { .. }));
    }

    #[test]
    fn test_clear_compliance_at_expiry_boundary() {
        let rec = record(RetentionMode::Compliance, 1);
        let at_expiry = now() + Duration::minutes(1);
        assert!(rec.clear(false, at_expiry).is_err());
        let after = at_expiry + Duration::seconds(1);
        assert_eq!(rec.clear(false, after), Ok(()));
    }

    #[test]
    fn test_update_extend_then_reduce() {
        let rec = record(RetentionMode::Governance, 1);
        let two = now() + Duration::minutes(2);
        let extended = rec
            .update(&RetentionRecord::proposed(RetentionMode::Governance, Some(two)), false, now())
            .unwrap();
        assert_eq!(extended.retain_until, Some(two));

        let one = now() + Duration::minutes(1);
        let err = extended
            .update(&RetentionRecord::proposed(RetentionMode::Governance, Some(one)), false, now())
            .unwrap_err();
        assert!(matches!(err, DenyReason::RetentionNotExtended { .. }));
    }

    #[test]
    fn test_update_reduce_governance_with_bypass() {
        let rec = record(RetentionMode::Governance, 10);
        let shorter = RetentionRecord::proposed(
            RetentionMode::Governance,
            Some(now() + Duration::minutes(5)),
        );
        assert!(rec.update(&shorter, true, now()).is_ok());

        let rec = record(RetentionMode::Compliance, 10);
        let shorter = RetentionRecord::proposed(
            RetentionMode::Compliance,
            Some(now() + Duration::minutes(5)),
        );
        let err = rec.update(&shorter, true, now()).unwrap_err();
        assert!(matches!(err, DenyReason::RetentionNotExtended { .. }));
    }

    #[test]
    fn test_update_same_date_is_noop() {
        let rec = record(RetentionMode::Compliance, 10);
        let same = RetentionRecord::proposed(RetentionMode::Compliance, rec.retain_until);
        assert_eq!(rec.update(&same, false, now()), Ok(rec));
    }

    #[test]
    fn test_update_clear() {
        let gov = record(RetentionMode::Governance, 10);
        let clear = RetentionRecord::none();
        assert_eq!(gov.update(&clear, false, now()), Err(DenyReason::GovernanceBypassRequired));
        assert_eq!(gov.update(&clear, true, now()), Ok(RetentionRecord::none()));

        let comp = record(RetentionMode::Compliance, 10);
        assert!(matches!(
            comp.update(&clear, true, now()),
            Err(DenyReason::ComplianceImmutable { .. })
        ));
    }

    #[test]
    fn test_update_mode_changes() {
        let later = Some(now() + Duration::minutes(20));
        let comp = record(RetentionMode::Compliance, 10);
        let downgrade = RetentionRecord::proposed(RetentionMode::Governance, later);
        assert!(matches!(
            comp.update(&downgrade, true, now()),
            Err(DenyReason::ComplianceImmutable { .. })
        ));

        let gov = record(RetentionMode::Governance, 10);
        let upgrade = RetentionRecord::proposed(RetentionMode::Compliance, later);
        assert_eq!(gov.update(&upgrade, false, now()).unwrap().mode, RetentionMode::Compliance);
    }

    #[test]
    fn test_update_after_expiry() {
        let comp = record(RetentionMode::Compliance, 1);
        let after = now() + Duration::minutes(2);
        let cleared = comp.update(&RetentionRecord::none(), false, after);
        assert_eq!(cleared, Ok(RetentionRecord::none()));

        let past = RetentionRecord::proposed(RetentionMode::Compliance, Some(now()));
        assert!(matches!(
            comp.update(&past, false, after),
            Err(DenyReason::InvalidRetention(_))
        ));
    }

    #[test]
    fn test_accepted_codes() {
        assert_eq!(DenyReason::LegalHoldActive.accepted_codes(), &[S3ErrorCode::AccessDenied]);
        assert!(DenyReason::RetentionNotExtended { current: now(), proposed: now() }
            .accepted_codes()
            .contains(&S3ErrorCode::InvalidRequest));
        assert!(!DenyReason::NoRetention.is_permission());
    }
}
