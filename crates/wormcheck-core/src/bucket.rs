// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Client-side model of a versioned, lock-enabled bucket.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retention::{DenyReason, RetentionRecord};
use crate::types::RetentionMode;

/// One version of an object, as the suite believes the server holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    /// Server-assigned version ID.
    pub version_id: String,
    /// Whether this version is a delete marker.
    pub is_delete_marker: bool,
    /// Retention, if any.
    pub retention: Option<RetentionRecord>,
    /// Legal hold status.
    pub legal_hold: bool,
}

impl ObjectVersion {
    /// A content version with optional retention.
    #[must_use]
    pub fn object(version_id: impl Into<String>, retention: Option<RetentionRecord>) -> Self {
        Self {
            version_id: version_id.into(),
            is_delete_marker: false,
            retention: retention.filter(|r| r.mode.is_locking()),
            legal_hold: false,
        }
    }

    /// A delete marker. Markers are tombstones and never carry retention.
    #[must_use]
    pub fn delete_marker(version_id: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            is_delete_marker: true,
            retention: None,
            legal_hold: false,
        }
    }

    /// Sets (or overwrites) the retention of this version.
    ///
    /// # Errors
    ///
    /// Fails with [`DenyReason::InvalidRetention`] for delete markers and for
    /// records rejected by [`RetentionRecord::apply`].
    pub fn apply(
        &mut self,
        mode: RetentionMode,
        retain_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<RetentionRecord, DenyReason> {
        self.ensure_content()?;
        let record = RetentionRecord::apply(mode, retain_until, now)?;
        self.retention = Some(record).filter(|r| r.mode.is_locking());
        Ok(record)
    }

    /// Validates a put-retention request against the current retention
    /// without changing anything.
    ///
    /// # Errors
    ///
    /// See [`RetentionRecord::update`].
    pub fn check_retention_update(
        &self,
        proposed: &RetentionRecord,
        bypass: bool,
        now: DateTime<Utc>,
    ) -> Result<RetentionRecord, DenyReason> {
        self.ensure_content()?;
        self.retention.unwrap_or_default().update(proposed, bypass, now)
    }

    /// Applies a put-retention request.
    ///
    /// # Errors
    ///
    /// See [`ObjectVersion::check_retention_update`].
    pub fn update_retention(
        &mut self,
        proposed: &RetentionRecord,
        bypass: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DenyReason> {
        let next = self.check_retention_update(proposed, bypass, now)?;
        self.retention = Some(next).filter(|r| r.mode.is_locking());
        Ok(())
    }

    /// Turns the legal hold on or off.
    ///
    /// # Errors
    ///
    /// Delete markers cannot hold a legal hold.
    pub fn set_legal_hold(&mut self, on: bool) -> Result<(), DenyReason> {
        self.ensure_content()?;
        self.legal_hold = on;
        Ok(())
    }

    /// Checks whether a versioned delete may remove this version.
    ///
    /// # Errors
    ///
    /// Legal holds win over everything; then the retention rules apply.
    pub fn permits_delete(&self, bypass: bool, now: DateTime<Utc>) -> Result<(), DenyReason> {
        if self.is_delete_marker {
            return Ok(());
        }
        if self.legal_hold {
            return Err(DenyReason::LegalHoldActive);
        }
        match &self.retention {
            Some(record) => record.permits_delete(bypass, now),
            None => Ok(()),
        }
    }

    fn ensure_content(&self) -> Result<(), DenyReason> {
        if self.is_delete_marker {
            return Err(DenyReason::InvalidRetention(format!(
                "version {} is a delete marker",
                self.version_id
            )));
        }
        Ok(())
    }
}

/// A bucket and the versions of every key in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Whether Object Lock was enabled at creation. Cannot change afterwards.
    pub object_lock_enabled: bool,
    objects: BTreeMap<String, Vec<ObjectVersion>>,
}

impl Bucket {
    /// Creates an empty bucket model.
    #[must_use]
    pub fn new(name: impl Into<String>, object_lock_enabled: bool) -> Self {
        Self { name: name.into(), object_lock_enabled, objects: BTreeMap::new() }
    }

    /// All versions of `key`, oldest first.
    #[must_use]
    pub fn versions(&self, key: &str) -> &[ObjectVersion] {
        self.objects.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The current (latest) version of `key`.
    #[must_use]
    pub fn current(&self, key: &str) -> Option<&ObjectVersion> {
        self.versions(key).last()
    }

    /// Looks up one version.
    #[must_use]
    pub fn version(&self, key: &str, version_id: &str) -> Option<&ObjectVersion> {
        self.versions(key).iter().find(|v| v.version_id == version_id)
    }

    /// Looks up one version for modification.
    pub fn version_mut(&mut self, key: &str, version_id: &str) -> Option<&mut ObjectVersion> {
        self.objects.get_mut(key)?.iter_mut().find(|v| v.version_id == version_id)
    }

    /// Appends a new current version.
    pub fn push(&mut self, key: impl Into<String>, version: ObjectVersion) {
        self.objects.entry(key.into()).or_default().push(version);
    }

    /// Removes one version permanently.
    pub fn remove(&mut self, key: &str, version_id: &str) -> Option<ObjectVersion> {
        let versions = self.objects.get_mut(key)?;
        let idx = versions.iter().position(|v| v.version_id == version_id)?;
        let removed = versions.remove(idx);
        if versions.is_empty() {
            self.objects.remove(key);
        }
        Some(removed)
    }

    /// Total number of versions (including delete markers) in the bucket.
    #[must_use]
    pub fn version_count(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bucket {} (object lock: {})", self.name, self.object_lock_enabled)?;
        for (key, versions) in &self.objects {
            for v in versions {
                write!(f, "\n  {key}@{}", v.version_id)?;
                if v.is_delete_marker {
                    write!(f, " [delete marker]")?;
                }
                if let Some(r) = &v.retention {
                    write!(f, " [{r}]")?;
                }
                if v.legal_hold {
                    write!(f, " [legal hold]")?;
                }
            }
        }
        Ok(())
    }
}
