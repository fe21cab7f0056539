// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Storage adapters for wormcheck.
//!
//! This crate provides:
//! - The [`ObjectStore`] trait covering the S3 calls the suite issues
//! - [`S3Store`], an adapter over the AWS SDK for live endpoints
//! - [`MemoryStore`], an in-process store with fault injection
//! - Multipart upload with abort-on-failure

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod multipart;
pub mod s3;

pub use backend::{
    CompletedPart, DeleteObjectResult, ObjectStore, PendingUpload, PutObjectResult, VersionEntry,
};
pub use error::{StoreError, StoreResult};
pub use memory::{Faults, MemoryStore};
pub use multipart::{plan_parts, upload_multipart, MultipartOutcome};
pub use s3::S3Store;
