// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Scenario oracle: predicts how a conforming server answers each request.
//!
//! The oracle is a decision table over the [`Bucket`] model. It never
//! performs I/O; the driver asks it for an [`Expectation`], executes the
//! request, compares, and on success calls [`Oracle::advance`] so the model
//! tracks the server.
//!
//! The model treats every bucket as versioned: Object Lock cannot be enabled
//! without versioning, and the suite only creates lock-enabled buckets.

use chrono::{DateTime, Utc};

use crate::bucket::{Bucket, ObjectVersion};
use crate::retention::{DenyReason, RetentionRecord};
use crate::types::ObjectLock;

/// A request the suite is about to send, with version IDs already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// PutObject (single or multipart) with an optional write-time lock.
    Put {
        /// Object key.
        key: String,
        /// Lock requested at write time.
        lock: Option<ObjectLock>,
    },
    /// DeleteObject. Without a version ID this creates a delete marker.
    Delete {
        /// Object key.
        key: String,
        /// Version to remove permanently.
        version_id: Option<String>,
        /// Send `x-amz-bypass-governance-retention: true`.
        bypass_governance: bool,
    },
    /// PutObjectRetention. A record with mode `None` clears the retention.
    PutRetention {
        /// Object key.
        key: String,
        /// Target version.
        version_id: String,
        /// Proposed retention.
        retention: RetentionRecord,
        /// Send `x-amz-bypass-governance-retention: true`.
        bypass_governance: bool,
    },
    /// GetObjectRetention.
    GetRetention {
        /// Object key.
        key: String,
        /// Target version.
        version_id: String,
    },
    /// PutObjectLegalHold.
    PutLegalHold {
        /// Object key.
        key: String,
        /// Target version.
        version_id: String,
        /// ON or OFF.
        on: bool,
    },
}

impl Operation {
    /// S3 API name of the request.
    #[must_use]
    pub const fn api_name(&self) -> &'static str {
        match self {
            Self::Put { .. } => "PutObject",
            Self::Delete { .. } => "DeleteObject",
            Self::PutRetention { .. } => "PutObjectRetention",
            Self::GetRetention { .. } => "GetObjectRetention",
            Self::PutLegalHold { .. } => "PutObjectLegalHold",
        }
    }

    /// Object key the request targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. }
            | Self::Delete { key, .. }
            | Self::PutRetention { key, .. }
            | Self::GetRetention { key, .. }
            | Self::PutLegalHold { key, .. } => key,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put { key, lock: Some(lock) } => write!(
                f,
                "PutObject {key} (lock {} until {})",
                lock.mode,
                lock.retain_until.to_rfc3339()
            ),
            Self::Put { key, lock: None } => write!(f, "PutObject {key}"),
            Self::Delete { key, version_id, bypass_governance } => {
                write!(f, "DeleteObject {key}")?;
                if let Some(v) = version_id {
                    write!(f, "@{v}")?;
                }
                if *bypass_governance {
                    write!(f, " (bypass governance)")?;
                }
                Ok(())
            }
            Self::PutRetention { key, version_id, retention, bypass_governance } => {
                write!(f, "PutObjectRetention {key}@{version_id} -> {retention}")?;
                if *bypass_governance {
                    write!(f, " (bypass governance)")?;
                }
                Ok(())
            }
            Self::GetRetention { key, version_id } => {
                write!(f, "GetObjectRetention {key}@{version_id}")
            }
            Self::PutLegalHold { key, version_id, on } => write!(
                f,
                "PutObjectLegalHold {key}@{version_id} -> {}",
                if *on { "ON" } else { "OFF" }
            ),
        }
    }
}

/// Predicted outcome of an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// The server must accept the request.
    Allow,
    /// The server must refuse the request.
    Deny(DenyReason),
}

impl Expectation {
    /// Returns true for [`Expectation::Allow`].
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "ALLOW"),
            Self::Deny(reason) => write!(f, "DENY({reason})"),
        }
    }
}

impl From<Result<(), DenyReason>> for Expectation {
    fn from(result: Result<(), DenyReason>) -> Self {
        match result {
            Ok(()) => Self::Allow,
            Err(reason) => Self::Deny(reason),
        }
    }
}

/// The object-lock decision table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oracle;

impl Oracle {
    /// Predicts the outcome of `op` against `bucket` at time `now`.
    #[must_use]
    pub fn expect(&self, bucket: &Bucket, op: &Operation, now: DateTime<Utc>) -> Expectation {
        match op {
            Operation::Put { lock: None, .. } => Expectation::Allow,
            Operation::Put { lock: Some(lock), .. } => {
                if !bucket.object_lock_enabled {
                    return Expectation::Deny(DenyReason::InvalidRetention(
                        "bucket is missing Object Lock configuration".to_string(),
                    ));
                }
                RetentionRecord::from_lock(lock, now).map(|_| ()).into()
            }
            // Unversioned deletes only add a delete marker.
            Operation::Delete { version_id: None, .. } => Expectation::Allow,
            Operation::Delete { key, version_id: Some(id), bypass_governance } => {
                // DeleteObject is idempotent for versions that do not exist.
                match bucket.version(key, id) {
                    Some(version) => version.permits_delete(*bypass_governance, now).into(),
                    None => Expectation::Allow,
                }
            }
            Operation::PutRetention { key, version_id, retention, bypass_governance } => {
                match Self::lookup(bucket, key, version_id) {
                    Ok(version) => version
                        .check_retention_update(retention, *bypass_governance, now)
                        .map(|_| ())
                        .into(),
                    Err(reason) => Expectation::Deny(reason),
                }
            }
            Operation::GetRetention { key, version_id } => {
                match Self::lookup(bucket, key, version_id) {
                    Ok(version) if version.is_delete_marker => Expectation::Deny(
                        DenyReason::InvalidRetention("delete markers carry no retention".into()),
                    ),
                    Ok(version) if version.retention.is_some() => Expectation::Allow,
                    Ok(_) => Expectation::Deny(DenyReason::NoRetention),
                    Err(reason) => Expectation::Deny(reason),
                }
            }
            Operation::PutLegalHold { key, version_id, on } => {
                match Self::lookup(bucket, key, version_id) {
                    Ok(version) => {
                        let mut probe = version.clone();
                        probe.set_legal_hold(*on).into()
                    }
                    Err(reason) => Expectation::Deny(reason),
                }
            }
        }
    }

    /// Retention a GetObjectRetention on this version must report.
    #[must_use]
    pub fn retention_of(
        &self,
        bucket: &Bucket,
        key: &str,
        version_id: &str,
    ) -> Option<RetentionRecord> {
        bucket.version(key, version_id).and_then(|v| v.retention)
    }

    /// Advances the model after the server accepted `op`.
    ///
    /// `assigned_version` is the version ID the server returned for puts and
    /// for unversioned deletes.
    pub fn advance(&self, bucket: &mut Bucket, op: &Operation, assigned_version: Option<&str>) {
        match op {
            Operation::Put { key, lock } => {
                let retention = lock
                    .as_ref()
                    .map(|l| RetentionRecord::proposed(l.mode, Some(l.retain_until)));
                let id = assigned_version.unwrap_or("null");
                bucket.push(key.clone(), ObjectVersion::object(id, retention));
            }
            Operation::Delete { key, version_id: None, .. } => {
                let id = assigned_version.unwrap_or("null");
                bucket.push(key.clone(), ObjectVersion::delete_marker(id));
            }
            Operation::Delete { key, version_id: Some(id), .. } => {
                bucket.remove(key, id);
            }
            Operation::PutRetention { key, version_id, retention, .. } => {
                if let Some(v) = bucket.version_mut(key, version_id) {
                    v.retention = Some(*retention).filter(|r| r.mode.is_locking());
                }
            }
            Operation::PutLegalHold { key, version_id, on } => {
                if let Some(v) = bucket.version_mut(key, version_id) {
                    v.legal_hold = *on;
                }
            }
            Operation::GetRetention { .. } => {}
        }
    }

    fn lookup<'a>(
        bucket: &'a Bucket,
        key: &str,
        version_id: &str,
    ) -> Result<&'a ObjectVersion, DenyReason> {
        bucket
            .version(key, version_id)
            .ok_or_else(|| DenyReason::NoSuchVersion(version_id.to_string()))
    }
}


#[cfg(test)]
mod proptest_oracle {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::types::RetentionMode;

    const KEY: &str = "testObject";

    type Sibling = (Option<(RetentionMode, i64)>, bool);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
    }

    /// Write-time lock (mode, minutes ahead) and legal hold of a plain version.
    fn sibling() -> impl Strategy<Value = Sibling> {
        let mode = prop_oneof![Just(RetentionMode::Governance), Just(RetentionMode::Compliance)];
        (proptest::option::of((mode, 1i64..=7 * 24 * 60)), any::<bool>())
    }

    fn add_sibling(bucket: &mut Bucket, id: &str, (lock, hold): Sibling) {
        let put = Operation::Put {
            key: KEY.to_string(),
            lock: lock.map(|(mode, mins)| ObjectLock::new(mode, now() + Duration::minutes(mins))),
        };
        Oracle.advance(bucket, &put, Some(id));
        if hold {
            let hold = Operation::PutLegalHold {
                key: KEY.to_string(),
                version_id: id.to_string(),
                on: true,
            };
            Oracle.advance(bucket, &hold, None);
        }
    }

    proptest! {
        /// A delete marker is removable whatever retention or legal hold its
        /// sibling versions carry.
        #[test]
        fn delete_marker_always_removable(
            older in prop::collection::vec(sibling(), 0..6),
            newer in prop::collection::vec(sibling(), 0..6),
            bypass in any::<bool>(),
        ) {
            let mut bucket = Bucket::new("b", true);
            for (i, sibling) in older.into_iter().enumerate() {
                add_sibling(&mut bucket, &format!("old{i}"), sibling);
            }
            let marker = Operation::Delete {
                key: KEY.to_string(),
                version_id: None,
                bypass_governance: false,
            };
            prop_assert_eq!(Oracle.expect(&bucket, &marker, now()), Expectation::Allow);
            Oracle.advance(&mut bucket, &marker, Some("m1"));
            for (i, sibling) in newer.into_iter().enumerate() {
                add_sibling(&mut bucket, &format!("new{i}"), sibling);
            }

            let remove = Operation::Delete {
                key: KEY.to_string(),
                version_id: Some("m1".to_string()),
                bypass_governance: bypass,
            };
            prop_assert_eq!(Oracle.expect(&bucket, &remove, now()), Expectation::Allow);
        }
    }
}
