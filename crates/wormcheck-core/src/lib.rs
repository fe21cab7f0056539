// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Core types and logic for wormcheck, an S3 Object Lock conformance suite.
//!
//! This crate provides the parts of the suite that never touch the network:
//! - The retention model (lock modes, retain-until dates, legal holds)
//! - The scenario oracle deciding which requests a server must accept
//! - Configuration management
//! - Error types with S3-compatible error codes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bucket;
pub mod config;
pub mod error;
pub mod oracle;
pub mod retention;
pub mod types;

pub use bucket::{Bucket, ObjectVersion};
pub use config::{CleanupConfig, Config, EndpointConfig, LogFormat, LoggingConfig, RunConfig};
pub use error::{Error, Result, S3ErrorCode};
pub use oracle::{Expectation, Operation, Oracle};
pub use retention::{DenyReason, RetentionRecord};
pub use types::{ETag, ObjectLock, RetentionMode};
