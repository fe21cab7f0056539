//! Object store trait definition.

use bytes::Bytes;
use wormcheck_core::{ETag, ObjectLock, RetentionRecord};

use crate::error::StoreResult;

/// Result of a put_object or complete_multipart_upload operation.
#[derive(Debug, Clone)]
pub struct PutObjectResult {
    /// The ETag of the stored object.
    pub etag: ETag,
    /// The version ID assigned by the server.
    pub version_id: Option<String>,
}

/// Result of a delete_object operation.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectResult {
    /// The version ID of the delete marker (if one was created) or of the
    /// removed version.
    pub version_id: Option<String>,
    /// Whether a delete marker was created or removed.
    pub is_delete_marker: bool,
}

/// One entry of a ListObjectVersions response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    /// Object key.
    pub key: String,
    /// Version ID.
    pub version_id: String,
    /// Whether the entry is a delete marker.
    pub is_delete_marker: bool,
}

/// One in-progress multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    /// Object key.
    pub key: String,
    /// Upload ID.
    pub upload_id: String,
}

/// A part reference for CompleteMultipartUpload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: i32,
    /// ETag returned by UploadPart.
    pub etag: ETag,
}

/// Trait for S3-compatible object stores under test.
///
/// Implementations are pure transport: they never interpret a failure, they
/// only report it as a [`crate::StoreError`].
#[allow(async_fn_in_trait)]
pub trait ObjectStore: Send + Sync {
    // Bucket operations

    /// Create a bucket, optionally with Object Lock enabled.
    async fn create_bucket(&self, bucket: &str, object_lock: bool) -> StoreResult<()>;

    /// Delete an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// List every version and delete marker in a bucket.
    async fn list_object_versions(&self, bucket: &str) -> StoreResult<Vec<VersionEntry>>;

    /// List multipart uploads that were neither completed nor aborted.
    async fn list_multipart_uploads(&self, bucket: &str) -> StoreResult<Vec<PendingUpload>>;

    // Object operations

    /// Store an object, optionally with a write-time lock.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        lock: Option<&ObjectLock>,
    ) -> StoreResult<PutObjectResult>;

    /// Delete an object. Without a version ID this creates a delete marker.
    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_governance: bool,
    ) -> StoreResult<DeleteObjectResult>;

    // Object Lock operations

    /// Read the retention of one version.
    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<RetentionRecord>;

    /// Replace the retention of one version. Mode `None` clears it.
    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        retention: &RetentionRecord,
        bypass_governance: bool,
    ) -> StoreResult<()>;

    /// Read the legal hold status of one version.
    async fn get_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<bool>;

    /// Turn the legal hold of one version on or off.
    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        on: bool,
    ) -> StoreResult<()>;

    // Multipart operations

    /// Start a multipart upload; the lock applies to the completed object.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        lock: Option<&ObjectLock>,
    ) -> StoreResult<String>;

    /// Upload one part.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<ETag>;

    /// Assemble the uploaded parts into the final object.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<PutObjectResult>;

    /// Discard a multipart upload and its parts.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()>;
}
