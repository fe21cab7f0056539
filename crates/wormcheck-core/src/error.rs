// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Error types for wormcheck and the S3 error codes the suite reasons about.

use thiserror::Error;

/// A specialized `Result` type for wormcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// S3 error codes that show up in object-lock conformance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3ErrorCode {
    /// Access denied. Servers answer most lock violations with this.
    AccessDenied,
    /// The specified bucket already exists.
    BucketAlreadyExists,
    /// The bucket you tried to delete is not empty.
    BucketNotEmpty,
    /// The specified bucket does not exist.
    NoSuchBucket,
    /// The specified key does not exist.
    NoSuchKey,
    /// The specified version does not exist.
    NoSuchVersion,
    /// The specified upload does not exist.
    NoSuchUpload,
    /// Your proposed upload is smaller than the minimum allowed object size.
    EntityTooSmall,
    /// One or more of the specified parts could not be found.
    InvalidPart,
    /// The list of parts was not in ascending order.
    InvalidPartOrder,
    /// Internal server error.
    InternalError,
    /// The request method is not allowed against this resource.
    MethodNotAllowed,
    /// The specified argument is not valid.
    InvalidArgument,
    /// Invalid request.
    InvalidRequest,
    /// The XML provided is not well-formed.
    MalformedXML,
    /// The functionality is not implemented.
    NotImplemented,
    /// The object has no retention or legal hold configuration.
    NoSuchObjectLockConfiguration,
    /// The bucket or object has no Object Lock configuration.
    ObjectLockConfigurationNotFoundError,
}

impl S3ErrorCode {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::AccessDenied => 403,
            Self::NoSuchBucket
            | Self::NoSuchKey
            | Self::NoSuchVersion
            | Self::NoSuchUpload
            | Self::NoSuchObjectLockConfiguration
            | Self::ObjectLockConfigurationNotFoundError => 404,
            Self::BucketAlreadyExists | Self::BucketNotEmpty => 409,
            Self::MethodNotAllowed => 405,
            Self::EntityTooSmall
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::InvalidArgument
            | Self::InvalidRequest
            | Self::MalformedXML => 400,
            Self::InternalError => 500,
            Self::NotImplemented => 501,
        }
    }

    /// Returns the S3 error code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchVersion => "NoSuchVersion",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InternalError => "InternalError",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidRequest => "InvalidRequest",
            Self::MalformedXML => "MalformedXML",
            Self::NotImplemented => "NotImplemented",
            Self::NoSuchObjectLockConfiguration => "NoSuchObjectLockConfiguration",
            Self::ObjectLockConfigurationNotFoundError => "ObjectLockConfigurationNotFoundError",
        }
    }
}

impl std::fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur while configuring or preparing a run.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_violation_statuses() {
        assert_eq!(S3ErrorCode::AccessDenied.http_status(), 403);
        assert_eq!(S3ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(S3ErrorCode::NotImplemented.http_status(), 501);
        assert_eq!(S3ErrorCode::NoSuchObjectLockConfiguration.http_status(), 404);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Config("part_size too small".to_string());
        assert_eq!(err.to_string(), "configuration error: part_size too small");
        assert_eq!(S3ErrorCode::MalformedXML.to_string(), "MalformedXML");
    }
}
