// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Structured failures returned by object store adapters.

use thiserror::Error;
use wormcheck_core::S3ErrorCode;

/// Message MinIO (and Mint) use when a request header asks for a feature the
/// server does not implement, such as Object Lock.
const NOT_IMPLEMENTED_MESSAGE: &str = "implies functionality that is not implemented";

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A failed store request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The server answered with an S3 error response.
    #[error("{code} (HTTP {status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// S3 error code, e.g. `AccessDenied`.
        code: String,
        /// Human-readable message from the server.
        message: String,
    },

    /// The request never produced a service response (connect failure,
    /// timeout, malformed response).
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Builds a service error from a known S3 error code.
    #[must_use]
    pub fn service(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self::Service {
            status: code.http_status(),
            code: code.as_str().to_string(),
            message: message.into(),
        }
    }

    /// The S3 error code, if the server sent one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            Self::Transport(_) => None,
        }
    }

    /// The HTTP status, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    /// Whether the request failed before reaching a service response.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the server refused the request as a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Whether the server reported the requested functionality as missing.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        match self {
            Self::Service { status, code, message } => {
                *status == 501
                    || code == S3ErrorCode::NotImplemented.as_str()
                    || message.contains(NOT_IMPLEMENTED_MESSAGE)
            }
            Self::Transport(_) => false,
        }
    }

    /// Whether the error code is one of `codes`.
    #[must_use]
    pub fn has_code_in(&self, codes: &[S3ErrorCode]) -> bool {
        self.code().is_some_and(|c| codes.iter().any(|known| known.as_str() == c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_detection() {
        assert!(StoreError::service(S3ErrorCode::NotImplemented, "nope").is_not_implemented());

        let minio = StoreError::Service {
            status: 400,
            code: "InvalidRequest".to_string(),
            message: "A header you provided implies functionality that is not implemented"
                .to_string(),
        };
        assert!(minio.is_not_implemented());

        assert!(!StoreError::service(S3ErrorCode::AccessDenied, "denied").is_not_implemented());
        assert!(!StoreError::Transport("connection refused".into()).is_not_implemented());
    }

    #[test]
    fn test_classification() {
        let denied = StoreError::service(S3ErrorCode::AccessDenied, "locked");
        assert!(denied.is_client_error());
        assert_eq!(denied.status(), Some(403));
        assert!(denied.has_code_in(&[S3ErrorCode::InvalidRequest, S3ErrorCode::AccessDenied]));
        assert!(!denied.has_code_in(&[S3ErrorCode::InvalidRequest]));

        let transport = StoreError::Transport("timed out".into());
        assert!(transport.is_transport());
        assert!(!transport.is_client_error());
        assert_eq!(transport.code(), None);
        assert_eq!(transport.to_string(), "transport error: timed out");
    }
}
