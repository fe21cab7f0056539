// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Common types used throughout wormcheck.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Object Lock retention mode.
///
/// `None` stands for the absence of a mode. On the wire it is an empty
/// `<Retention/>` body, which asks the server to clear the retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionMode {
    /// No retention.
    #[default]
    None,
    /// Deletion and shortening require `x-amz-bypass-governance-retention`.
    Governance,
    /// Nobody can delete or shorten until the retain-until date passes.
    Compliance,
}

impl RetentionMode {
    /// Parses an S3 wire value. The empty string maps to [`RetentionMode::None`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" => Some(Self::None),
            "GOVERNANCE" => Some(Self::Governance),
            "COMPLIANCE" => Some(Self::Compliance),
            _ => None,
        }
    }

    /// Returns the S3 wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Governance => "GOVERNANCE",
            Self::Compliance => "COMPLIANCE",
        }
    }

    /// Returns true for `Governance` and `Compliance`.
    #[must_use]
    pub const fn is_locking(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// A lock requested at write time (PutObject or CreateMultipartUpload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLock {
    /// Lock mode. Never `RetentionMode::None` for a well-formed request.
    pub mode: RetentionMode,
    /// Retain-until date.
    pub retain_until: DateTime<Utc>,
}

impl ObjectLock {
    /// Creates a lock request.
    #[must_use]
    pub fn new(mode: RetentionMode, retain_until: DateTime<Utc>) -> Self {
        Self { mode, retain_until: truncate_to_seconds(retain_until) }
    }
}

/// An S3 ETag value.
///
/// ETags are MD5 hashes of object content for single-part uploads,
/// or `MD5(concat(part_md5s))-{num_parts}` for multipart uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ETag(String);

impl ETag {
    /// Creates a new ETag from a string value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates an ETag from an MD5 hash (single-part upload).
    #[must_use]
    pub fn from_md5(hash: &[u8; 16]) -> Self {
        Self(format!("\"{}\"", hex::encode(hash)))
    }

    /// Creates an ETag for a multipart upload.
    #[must_use]
    pub fn from_multipart(hash: &[u8; 16], num_parts: usize) -> Self {
        Self(format!("\"{}-{}\"", hex::encode(hash), num_parts))
    }

    /// Returns the ETag value as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether this ETag is from a multipart upload.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.0.contains('-')
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ETag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ETag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Drops sub-second precision. Servers store retain-until dates at second
/// granularity, so every date the suite sends or compares goes through here.
#[must_use]
pub fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_retention_mode_parse() {
        assert_eq!(RetentionMode::parse("GOVERNANCE"), Some(RetentionMode::Governance));
        assert_eq!(RetentionMode::parse("compliance"), Some(RetentionMode::Compliance));
        assert_eq!(RetentionMode::parse(""), Some(RetentionMode::None));
        assert_eq!(RetentionMode::parse("LEGAL"), None);
    }

    #[test]
    fn test_retention_mode_display() {
        assert_eq!(RetentionMode::None.to_string(), "NONE");
        assert_eq!(RetentionMode::Governance.to_string(), "GOVERNANCE");
        assert!(RetentionMode::Compliance.is_locking());
        assert!(!RetentionMode::None.is_locking());
    }

    #[test]
    fn test_etag_from_md5() {
        let hash: [u8; 16] = [
            0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8,
            0x42, 0x7e,
        ];
        let etag = ETag::from_md5(&hash);
        assert_eq!(etag.as_str(), "\"d41d8cd98f00b204e9800998ecf8427e\"");
        assert!(!etag.is_multipart());
    }

    #[test]
    fn test_etag_multipart() {
        let etag = ETag::from_multipart(&[0; 16], 3);
        assert!(etag.as_str().ends_with("-3\""));
        assert!(etag.is_multipart());
    }

    #[test]
    fn test_object_lock_truncates_subseconds() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        let lock = ObjectLock::new(RetentionMode::Governance, at);
        assert_eq!(lock.retain_until, Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 5).unwrap());
    }
}
