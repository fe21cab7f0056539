// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Bucket teardown.
//!
//! Removes every multipart session, version and delete marker, then the
//! bucket itself. Versions under COMPLIANCE retention cannot be removed until
//! they expire, so the version sweep repeats until the bucket is empty or the
//! cleanup deadline passes. Each store call is retried once on a transport
//! error.

use std::future::Future;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use wormcheck_core::CleanupConfig;
use wormcheck_storage::{ObjectStore, StoreError, StoreResult, VersionEntry};

use crate::error::ScenarioError;

/// Clean sweeps in a row that may end with the bucket still listing versions.
const MAX_STALLED_SWEEPS: u32 = 3;

/// Empties and deletes `bucket`.
///
/// # Errors
///
/// Returns [`ScenarioError::Transport`] when a call still fails after its
/// retry, [`ScenarioError::CleanupIncomplete`] when protected versions
/// outlive the deadline, and [`ScenarioError::Cleanup`] for other service
/// errors.
pub async fn cleanup_bucket<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    config: &CleanupConfig,
) -> Result<(), ScenarioError> {
    abort_uploads(store, bucket).await;

    let deadline = Instant::now() + config.timeout();
    let mut stalled = 0;
    loop {
        let versions =
            retry_once(move || store.list_object_versions(bucket)).await.map_err(classify)?;
        if versions.is_empty() {
            break;
        }

        let mut protected = 0;
        for entry in &versions {
            if !delete_version(store, bucket, entry).await? {
                protected += 1;
            }
        }

        if protected == 0 {
            stalled += 1;
            if stalled >= MAX_STALLED_SWEEPS {
                return Err(ScenarioError::CleanupIncomplete {
                    bucket: bucket.to_string(),
                    remaining: versions.len(),
                });
            }
            continue;
        }
        stalled = 0;

        let now = Instant::now();
        if now >= deadline {
            return Err(ScenarioError::CleanupIncomplete {
                bucket: bucket.to_string(),
                remaining: protected,
            });
        }
        debug!(bucket, protected, "Waiting for retention to expire");
        tokio::time::sleep(config.poll_interval().min(deadline - now)).await;
    }

    retry_once(move || store.delete_bucket(bucket)).await.map_err(classify)?;
    info!(bucket, "Bucket removed");
    Ok(())
}

/// Aborts leftover multipart uploads. Failures are logged and never stop the
/// version sweep.
async fn abort_uploads<S: ObjectStore + ?Sized>(store: &S, bucket: &str) {
    let uploads = match retry_once(move || store.list_multipart_uploads(bucket)).await {
        Ok(uploads) => uploads,
        Err(e) => {
            warn!(bucket, error = %e, "Failed to list multipart uploads");
            return;
        }
    };
    for upload in &uploads {
        let (key, upload_id) = (upload.key.as_str(), upload.upload_id.as_str());
        debug!(bucket, key, upload_id, "Aborting multipart upload");
        let abort = move || store.abort_multipart_upload(bucket, key, upload_id);
        if let Err(e) = retry_once(abort).await {
            warn!(bucket, upload_id, error = %e, "Failed to abort multipart upload");
        }
    }
}

/// Deletes one version with governance bypass. Returns `false` when the
/// version is still protected.
async fn delete_version<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    entry: &VersionEntry,
) -> Result<bool, ScenarioError> {
    let key = entry.key.as_str();
    let version_id = entry.version_id.as_str();
    let delete = move || store.delete_object(bucket, key, Some(version_id), true);

    let err = match retry_once(delete).await {
        Ok(_) => return Ok(true),
        Err(e) if e.is_transport() => return Err(ScenarioError::Transport(e)),
        Err(e) => e,
    };

    // Bypass does not lift a legal hold.
    let held = move || store.get_object_legal_hold(bucket, key, version_id);
    if !entry.is_delete_marker && matches!(retry_once(held).await, Ok(true)) {
        retry_once(move || store.put_object_legal_hold(bucket, key, version_id, false))
            .await
            .map_err(classify)?;
        if retry_once(delete).await.is_ok() {
            return Ok(true);
        }
    }

    debug!(bucket, key, version_id, error = %err, "Version still protected");
    Ok(false)
}

/// Runs `op`, and once more if it failed with a transport error.
async fn retry_once<T, F, Fut>(op: F) -> StoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    match op().await {
        Err(e) if e.is_transport() => {
            warn!(error = %e, "Transport error during cleanup, retrying once");
            op().await
        }
        other => other,
    }
}

fn classify(err: StoreError) -> ScenarioError {
    if err.is_transport() {
        ScenarioError::Transport(err)
    } else {
        ScenarioError::Cleanup(err)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::{Duration as ChronoDuration, Utc};
    use wormcheck_core::{ObjectLock, RetentionMode, S3ErrorCode};
    use wormcheck_storage::{Faults, MemoryStore};

    use super::*;

    const BUCKET: &str = "versioning-test-cleanup";

    fn quick() -> CleanupConfig {
        CleanupConfig { timeout_secs: 0, poll_interval_secs: 0 }
    }

    #[tokio::test]
    async fn test_removes_governance_versions_markers_and_holds() {
        let store = MemoryStore::new();
        store.create_bucket(BUCKET, true).await.unwrap();
        let until = Utc::now() + ChronoDuration::hours(1);
        let lock = ObjectLock::new(RetentionMode::Governance, until);
        store.put_object(BUCKET, "a", Bytes::from_static(b"1"), Some(&lock)).await.unwrap();
        let held = store.put_object(BUCKET, "b", Bytes::from_static(b"2"), None).await.unwrap();
        let held = held.version_id.unwrap();
        store.put_object_legal_hold(BUCKET, "b", &held, true).await.unwrap();
        store.delete_object(BUCKET, "a", None, false).await.unwrap();
        store.create_multipart_upload(BUCKET, "c", None).await.unwrap();

        cleanup_bucket(&store, BUCKET, &quick()).await.unwrap();
        assert!(!store.bucket_exists(BUCKET));
        assert_eq!(store.pending_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_listing_failure_still_removes_bucket() {
        let store = MemoryStore::with_faults(Faults {
            list_uploads_error: Some(S3ErrorCode::NotImplemented),
            ..Faults::default()
        });
        store.create_bucket(BUCKET, true).await.unwrap();
        store.put_object(BUCKET, "a", Bytes::from_static(b"1"), None).await.unwrap();
        store.delete_object(BUCKET, "a", None, false).await.unwrap();

        cleanup_bucket(&store, BUCKET, &quick()).await.unwrap();
        assert!(!store.bucket_exists(BUCKET));
    }

    #[tokio::test]
    async fn test_transport_error_is_retried_once() {
        let store = MemoryStore::new();
        store.create_bucket(BUCKET, true).await.unwrap();
        store.put_object(BUCKET, "a", Bytes::from_static(b"1"), None).await.unwrap();
        store.fail_next_deletes(1);

        cleanup_bucket(&store, BUCKET, &quick()).await.unwrap();
        assert!(!store.bucket_exists(BUCKET));
    }

    #[tokio::test]
    async fn test_persistent_transport_error_is_reported() {
        let store = MemoryStore::new();
        store.create_bucket(BUCKET, true).await.unwrap();
        store.put_object(BUCKET, "a", Bytes::from_static(b"1"), None).await.unwrap();
        store.fail_next_deletes(2);

        let err = cleanup_bucket(&store, BUCKET, &quick()).await.unwrap_err();
        assert!(matches!(err, ScenarioError::Transport(_)));
        assert!(store.bucket_exists(BUCKET));
    }

    #[tokio::test]
    async fn test_compliance_version_outlives_deadline() {
        let store = MemoryStore::new();
        store.create_bucket(BUCKET, true).await.unwrap();
        let until = Utc::now() + ChronoDuration::hours(1);
        let lock = ObjectLock::new(RetentionMode::Compliance, until);
        store.put_object(BUCKET, "a", Bytes::from_static(b"1"), Some(&lock)).await.unwrap();
        store.put_object(BUCKET, "a", Bytes::from_static(b"2"), None).await.unwrap();

        let err = cleanup_bucket(&store, BUCKET, &quick()).await.unwrap_err();
        assert!(matches!(err, ScenarioError::CleanupIncomplete { remaining: 1, .. }));
        assert_eq!(store.version_count(BUCKET), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compliance_sweeps_until_deadline() {
        let store = MemoryStore::new();
        store.create_bucket(BUCKET, true).await.unwrap();
        let until = Utc::now() + ChronoDuration::hours(1);
        let lock = ObjectLock::new(RetentionMode::Compliance, until);
        store.put_object(BUCKET, "a", Bytes::from_static(b"1"), Some(&lock)).await.unwrap();

        let config = CleanupConfig { timeout_secs: 12, poll_interval_secs: 5 };
        let started = Instant::now();
        let err = cleanup_bucket(&store, BUCKET, &config).await.unwrap_err();
        assert!(matches!(err, ScenarioError::CleanupIncomplete { .. }));
        assert!(started.elapsed() >= std::time::Duration::from_secs(12));
    }
}
