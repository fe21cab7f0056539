// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`ObjectStore`] with S3 Object Lock semantics.
//!
//! Used to exercise the driver without a live endpoint. The lock rules here
//! are written against S3 behavior directly rather than through the
//! `wormcheck-core` oracle, so a disagreement between the two surfaces as a
//! failing scenario. Fault injection covers the paths a real server rarely
//! takes on demand: missing Object Lock support, failing parts, transport
//! errors and slow responses.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::trace;
use wormcheck_core::config::MIN_PART_SIZE;
use wormcheck_core::types::truncate_to_seconds;
use wormcheck_core::{ETag, ObjectLock, RetentionMode, RetentionRecord, S3ErrorCode};

use crate::backend::{
    CompletedPart, DeleteObjectResult, ObjectStore, PendingUpload, PutObjectResult, VersionEntry,
};
use crate::error::{StoreError, StoreResult};

/// Faults the store injects into otherwise well-behaved responses.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Answer `ObjectLockEnabledForBucket` with MinIO's NotImplemented error.
    pub object_lock_unsupported: bool,
    /// Fail every CreateBucket with this code.
    pub create_bucket_error: Option<S3ErrorCode>,
    /// Create the bucket, then hold the CreateBucket response this long.
    pub create_bucket_response_delay: Option<Duration>,
    /// Fail every ListMultipartUploads with this code.
    pub list_uploads_error: Option<S3ErrorCode>,
    /// Fail UploadPart for this part number with an internal error.
    pub fail_part: Option<i32>,
    /// Sleep this long before answering any request.
    pub latency: Option<Duration>,
    /// Accept versioned deletes of COMPLIANCE-locked versions. Simulates a
    /// non-conforming server.
    pub ignore_compliance: bool,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    version_id: String,
    delete_marker: bool,
    etag: ETag,
    retention: Option<(RetentionMode, DateTime<Utc>)>,
    legal_hold: bool,
}

impl StoredVersion {
    fn active_retention(&self, now: DateTime<Utc>) -> Option<(RetentionMode, DateTime<Utc>)> {
        self.retention.filter(|(_, until)| *until > now)
    }
}

#[derive(Debug, Default)]
struct BucketData {
    object_lock: bool,
    objects: BTreeMap<String, Vec<StoredVersion>>,
}

#[derive(Debug)]
struct Upload {
    bucket: String,
    key: String,
    lock: Option<ObjectLock>,
    parts: BTreeMap<i32, (ETag, Bytes)>,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, BucketData>,
    uploads: HashMap<String, Upload>,
}

/// A versioned, lock-aware object store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Faults,
    next_id: AtomicU64,
    transport_failures: AtomicU32,
}

impl MemoryStore {
    /// Creates an empty, fully conforming store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given faults.
    #[must_use]
    pub fn with_faults(faults: Faults) -> Self {
        Self { faults, ..Self::default() }
    }

    /// Makes the next `count` DeleteObject calls fail with a transport error.
    pub fn fail_next_deletes(&self, count: u32) {
        self.transport_failures.store(count, Ordering::SeqCst);
    }

    /// Whether a bucket exists.
    #[must_use]
    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.state.lock().buckets.contains_key(bucket)
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.state.lock().buckets.len()
    }

    /// Number of versions (including delete markers) in a bucket.
    #[must_use]
    pub fn version_count(&self, bucket: &str) -> usize {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .map_or(0, |b| b.objects.values().map(Vec::len).sum())
    }

    /// Number of multipart uploads neither completed nor aborted.
    #[must_use]
    pub fn pending_upload_count(&self) -> usize {
        self.state.lock().uploads.len()
    }

    fn next_version_id(&self) -> String {
        format!("{:016x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn delay(&self) {
        if let Some(latency) = self.faults.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn validate_lock(
        object_lock: bool,
        lock: Option<&ObjectLock>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(RetentionMode, DateTime<Utc>)>> {
        let Some(lock) = lock else {
            return Ok(None);
        };
        if !object_lock {
            return Err(StoreError::service(
                S3ErrorCode::InvalidRequest,
                "Bucket is missing Object Lock Configuration",
            ));
        }
        if !lock.mode.is_locking() {
            return Err(StoreError::service(
                S3ErrorCode::InvalidArgument,
                "Unknown wormMode directive",
            ));
        }
        if lock.retain_until <= now {
            return Err(StoreError::service(
                S3ErrorCode::InvalidArgument,
                "The retain until date must be in the future",
            ));
        }
        Ok(Some((lock.mode, truncate_to_seconds(lock.retain_until))))
    }
}

fn no_such_bucket(bucket: &str) -> StoreError {
    let message = format!("The specified bucket does not exist: {bucket}");
    StoreError::service(S3ErrorCode::NoSuchBucket, message)
}

fn no_such_version(version_id: &str) -> StoreError {
    let message = format!("The specified version does not exist: {version_id}");
    StoreError::service(S3ErrorCode::NoSuchVersion, message)
}

fn find_version<'a>(
    data: &'a mut BucketData,
    key: &str,
    version_id: &str,
) -> StoreResult<&'a mut StoredVersion> {
    data.objects
        .get_mut(key)
        .and_then(|versions| versions.iter_mut().find(|v| v.version_id == version_id))
        .ok_or_else(|| no_such_version(version_id))
}

fn content_etag(body: &[u8]) -> ETag {
    ETag::from_md5(&md5::compute(body).0)
}

impl ObjectStore for MemoryStore {
    async fn create_bucket(&self, bucket: &str, object_lock: bool) -> StoreResult<()> {
        self.delay().await;
        if let Some(code) = self.faults.create_bucket_error {
            return Err(StoreError::service(code, "injected CreateBucket failure"));
        }
        if object_lock && self.faults.object_lock_unsupported {
            return Err(StoreError::service(
                S3ErrorCode::NotImplemented,
                "A header you provided implies functionality that is not implemented",
            ));
        }
        {
            let mut state = self.state.lock();
            if state.buckets.contains_key(bucket) {
                return Err(StoreError::service(
                    S3ErrorCode::BucketAlreadyExists,
                    "The requested bucket name is not available",
                ));
            }
            state
                .buckets
                .insert(bucket.to_string(), BucketData { object_lock, ..BucketData::default() });
        }
        if let Some(delay) = self.faults.create_bucket_response_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        let data = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !data.objects.is_empty() {
            return Err(StoreError::service(
                S3ErrorCode::BucketNotEmpty,
                "The bucket you tried to delete is not empty",
            ));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn list_object_versions(&self, bucket: &str) -> StoreResult<Vec<VersionEntry>> {
        self.delay().await;
        let state = self.state.lock();
        let data = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(data
            .objects
            .iter()
            .flat_map(|(key, versions)| {
                versions.iter().rev().map(move |v| VersionEntry {
                    key: key.clone(),
                    version_id: v.version_id.clone(),
                    is_delete_marker: v.delete_marker,
                })
            })
            .collect())
    }

    async fn list_multipart_uploads(&self, bucket: &str) -> StoreResult<Vec<PendingUpload>> {
        self.delay().await;
        if let Some(code) = self.faults.list_uploads_error {
            return Err(StoreError::service(code, "injected ListMultipartUploads failure"));
        }
        let state = self.state.lock();
        if !state.buckets.contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }
        Ok(state
            .uploads
            .iter()
            .filter(|(_, u)| u.bucket == bucket)
            .map(|(id, u)| PendingUpload { key: u.key.clone(), upload_id: id.clone() })
            .collect())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        lock: Option<&ObjectLock>,
    ) -> StoreResult<PutObjectResult> {
        self.delay().await;
        let version_id = self.next_version_id();
        let mut state = self.state.lock();
        let data = state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let retention = Self::validate_lock(data.object_lock, lock, Utc::now())?;
        let etag = content_etag(&body);
        data.objects.entry(key.to_string()).or_default().push(StoredVersion {
            version_id: version_id.clone(),
            delete_marker: false,
            etag: etag.clone(),
            retention,
            legal_hold: false,
        });
        trace!(bucket, key, %version_id, "Stored object version");
        Ok(PutObjectResult { etag, version_id: Some(version_id) })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_governance: bool,
    ) -> StoreResult<DeleteObjectResult> {
        self.delay().await;
        let injected = self
            .transport_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Transport("injected connection reset".to_string()));
        }

        let marker_id = self.next_version_id();
        let now = Utc::now();
        let mut state = self.state.lock();
        let data = state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;

        let Some(version_id) = version_id else {
            data.objects.entry(key.to_string()).or_default().push(StoredVersion {
                version_id: marker_id.clone(),
                delete_marker: true,
                etag: ETag::new(""),
                retention: None,
                legal_hold: false,
            });
            return Ok(DeleteObjectResult { version_id: Some(marker_id), is_delete_marker: true });
        };

        let Some(versions) = data.objects.get_mut(key) else {
            return Ok(DeleteObjectResult {
                version_id: Some(version_id.to_string()),
                ..Default::default()
            });
        };
        let Some(idx) = versions.iter().position(|v| v.version_id == version_id) else {
            return Ok(DeleteObjectResult {
                version_id: Some(version_id.to_string()),
                ..Default::default()
            });
        };

        let target = &versions[idx];
        if !target.delete_marker {
            if target.legal_hold {
                return Err(StoreError::service(
                    S3ErrorCode::AccessDenied,
                    "Object is under legal hold",
                ));
            }
            match target.active_retention(now) {
                Some((RetentionMode::Compliance, _)) if !self.faults.ignore_compliance => {
                    return Err(StoreError::service(
                        S3ErrorCode::AccessDenied,
                        "Object is WORM protected and cannot be overwritten",
                    ));
                }
                Some((RetentionMode::Governance, _)) if !bypass_governance => {
                    return Err(StoreError::service(
                        S3ErrorCode::AccessDenied,
                        "Object is WORM protected and cannot be overwritten",
                    ));
                }
                _ => {}
            }
        }

        let removed = versions.remove(idx);
        if versions.is_empty() {
            data.objects.remove(key);
        }
        Ok(DeleteObjectResult {
            version_id: Some(removed.version_id),
            is_delete_marker: removed.delete_marker,
        })
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<RetentionRecord> {
        self.delay().await;
        let mut state = self.state.lock();
        let data = state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !data.object_lock {
            return Err(StoreError::service(
                S3ErrorCode::ObjectLockConfigurationNotFoundError,
                "Object Lock configuration does not exist for this bucket",
            ));
        }
        let version = find_version(data, key, version_id)?;
        if version.delete_marker {
            return Err(StoreError::service(
                S3ErrorCode::MethodNotAllowed,
                "The specified method is not allowed against a delete marker",
            ));
        }
        match version.retention {
            Some((mode, until)) => Ok(RetentionRecord::proposed(mode, Some(until))),
            None => Err(StoreError::service(
                S3ErrorCode::NoSuchObjectLockConfiguration,
                "The specified object does not have a ObjectLock configuration",
            )),
        }
    }

    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        retention: &RetentionRecord,
        bypass_governance: bool,
    ) -> StoreResult<()> {
        self.delay().await;
        let now = Utc::now();
        let mut state = self.state.lock();
        let data = state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !data.object_lock {
            return Err(StoreError::service(
                S3ErrorCode::InvalidRequest,
                "Bucket is missing Object Lock Configuration",
            ));
        }
        let version = find_version(data, key, version_id)?;
        if version.delete_marker {
            return Err(StoreError::service(
                S3ErrorCode::MethodNotAllowed,
                "The specified method is not allowed against a delete marker",
            ));
        }

        let requested = match (retention.mode.is_locking(), retention.retain_until) {
            (false, None) => None,
            (true, Some(until)) if until > now => {
                Some((retention.mode, truncate_to_seconds(until)))
            }
            (true, Some(_)) => {
                return Err(StoreError::service(
                    S3ErrorCode::InvalidArgument,
                    "The retain until date must be in the future",
                ));
            }
            _ => {
                return Err(StoreError::service(
                    S3ErrorCode::MalformedXML,
                    "Retention must carry both Mode and RetainUntilDate",
                ));
            }
        };

        if let Some((mode, until)) = version.active_retention(now) {
            let denied = match (mode, requested) {
                (RetentionMode::Compliance, None) => true,
                (RetentionMode::Compliance, Some((new_mode, new_until))) => {
                    new_mode != RetentionMode::Compliance || new_until < until
                }
                (_, None) => !bypass_governance,
                (_, Some((_, new_until))) => new_until < until && !bypass_governance,
            };
            if denied {
                return Err(StoreError::service(
                    S3ErrorCode::AccessDenied,
                    "Object is WORM protected and cannot be overwritten",
                ));
            }
        }

        version.retention = requested;
        Ok(())
    }

    async fn get_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<bool> {
        self.delay().await;
        let mut state = self.state.lock();
        let data = state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(find_version(data, key, version_id)?.legal_hold)
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        on: bool,
    ) -> StoreResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        let data = state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !data.object_lock {
            return Err(StoreError::service(
                S3ErrorCode::InvalidRequest,
                "Bucket is missing Object Lock Configuration",
            ));
        }
        let version = find_version(data, key, version_id)?;
        if version.delete_marker {
            return Err(StoreError::service(
                S3ErrorCode::MethodNotAllowed,
                "The specified method is not allowed against a delete marker",
            ));
        }
        version.legal_hold = on;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        lock: Option<&ObjectLock>,
    ) -> StoreResult<String> {
        self.delay().await;
        let upload_id = uuid::Uuid::new_v4().to_string();
        let mut state = self.state.lock();
        let data = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Self::validate_lock(data.object_lock, lock, Utc::now())?;
        state.uploads.insert(
            upload_id.clone(),
            Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                lock: lock.copied(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<ETag> {
        self.delay().await;
        if self.faults.fail_part == Some(part_number) {
            return Err(StoreError::service(
                S3ErrorCode::InternalError,
                format!("injected failure for part {part_number}"),
            ));
        }
        if !(1..=10_000).contains(&part_number) {
            return Err(StoreError::service(
                S3ErrorCode::InvalidArgument,
                "Part number must be an integer between 1 and 10000, inclusive",
            ));
        }
        let mut state = self.state.lock();
        let upload = state.uploads.get_mut(upload_id).ok_or_else(|| {
            StoreError::service(S3ErrorCode::NoSuchUpload, "The specified upload does not exist")
        })?;
        let etag = content_etag(&body);
        upload.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<PutObjectResult> {
        self.delay().await;
        let version_id = self.next_version_id();
        let now = Utc::now();
        let mut state = self.state.lock();
        let upload = state.uploads.get(upload_id).ok_or_else(|| {
            StoreError::service(S3ErrorCode::NoSuchUpload, "The specified upload does not exist")
        })?;

        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StoreError::service(
                S3ErrorCode::InvalidPartOrder,
                "The list of parts was not in ascending order",
            ));
        }
        let mut digest_input = Vec::with_capacity(parts.len() * 16);
        for (i, part) in parts.iter().enumerate() {
            let (etag, body) = upload
                .parts
                .get(&part.part_number)
                .filter(|(etag, _)| *etag == part.etag)
                .ok_or_else(|| {
                    StoreError::service(
                        S3ErrorCode::InvalidPart,
                        format!("Part {} could not be found", part.part_number),
                    )
                })?;
            if i + 1 < parts.len() && (body.len() as u64) < MIN_PART_SIZE {
                return Err(StoreError::service(
                    S3ErrorCode::EntityTooSmall,
                    "Your proposed upload is smaller than the minimum allowed object size",
                ));
            }
            digest_input.extend_from_slice(etag.as_str().trim_matches('"').as_bytes());
        }

        let lock = upload.lock;
        let Some(upload) = state.uploads.remove(upload_id) else {
            return Err(StoreError::service(
                S3ErrorCode::NoSuchUpload,
                "The specified upload does not exist",
            ));
        };
        let data = state.buckets.get_mut(&upload.bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let retention = Self::validate_lock(data.object_lock, lock.as_ref(), now)?;
        let etag = ETag::from_multipart(&md5::compute(&digest_input).0, parts.len());
        data.objects.entry(key.to_string()).or_default().push(StoredVersion {
            version_id: version_id.clone(),
            delete_marker: false,
            etag: etag.clone(),
            retention,
            legal_hold: false,
        });
        Ok(PutObjectResult { etag, version_id: Some(version_id) })
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.delay().await;
        self.state.lock().uploads.remove(upload_id).map(|_| ()).ok_or_else(|| {
            StoreError::service(S3ErrorCode::NoSuchUpload, "The specified upload does not exist")
        })
    }
}
