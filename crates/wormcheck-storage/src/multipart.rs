//! Sequential multipart upload with abort on failure.

use bytes::Bytes;
use tracing::{debug, warn};
use wormcheck_core::ObjectLock;

use crate::backend::{CompletedPart, ObjectStore, PutObjectResult};
use crate::error::StoreResult;

/// Outcome of a completed multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartOutcome {
    /// Upload ID the session ran under.
    pub upload_id: String,
    /// Number of parts uploaded.
    pub parts: usize,
    /// ETag and version ID of the assembled object.
    pub object: PutObjectResult,
}

/// Splits `total` bytes into `(offset, len)` ranges of at most `part_size`.
///
/// Every range but the last is exactly `part_size` long. An empty body still
/// yields one empty part, since S3 requires at least one.
#[must_use]
pub fn plan_parts(total: usize, part_size: usize) -> Vec<(usize, usize)> {
    let part_size = part_size.max(1);
    if total == 0 {
        return vec![(0, 0)];
    }
    (0..total)
        .step_by(part_size)
        .map(|offset| (offset, part_size.min(total - offset)))
        .collect()
}

/// Uploads `body` as a multipart object, parts numbered from 1.
///
/// If any part or the completion fails, the session is aborted before the
/// error is returned so no orphaned parts stay behind. A failing abort is
/// logged and the original error still wins.
///
/// # Errors
///
/// Returns the first store error of the session.
pub async fn upload_multipart<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    key: &str,
    body: Bytes,
    part_size: usize,
    lock: Option<&ObjectLock>,
) -> StoreResult<MultipartOutcome> {
    let upload_id = store.create_multipart_upload(bucket, key, lock).await?;
    debug!(bucket, key, %upload_id, size = body.len(), "Started multipart upload");

    match upload_parts(store, bucket, key, &upload_id, body, part_size).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            if let Err(abort_err) = store.abort_multipart_upload(bucket, key, &upload_id).await {
                warn!(
                    bucket,
                    key,
                    %upload_id,
                    error = %abort_err,
                    "Failed to abort multipart upload"
                );
            }
            Err(e)
        }
    }
}

async fn upload_parts<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    key: &str,
    upload_id: &str,
    body: Bytes,
    part_size: usize,
) -> StoreResult<MultipartOutcome> {
    let plan = plan_parts(body.len(), part_size);
    let mut completed = Vec::with_capacity(plan.len());
    for (idx, (offset, len)) in plan.into_iter().enumerate() {
        let part_number = i32::try_from(idx + 1).unwrap_or(i32::MAX);
        let etag = store
            .upload_part(bucket, key, upload_id, part_number, body.slice(offset..offset + len))
            .await?;
        completed.push(CompletedPart { part_number, etag });
    }

    let object = store.complete_multipart_upload(bucket, key, upload_id, &completed).await?;
    Ok(MultipartOutcome { upload_id: upload_id.to_string(), parts: completed.len(), object })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Faults, MemoryStore};

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_plan_parts() {
        assert_eq!(
            plan_parts(15 * MIB, 5 * MIB),
            vec![(0, 5 * MIB), (5 * MIB, 5 * MIB), (10 * MIB, 5 * MIB)]
        );
        assert_eq!(plan_parts(11, 5), vec![(0, 5), (5, 5), (10, 1)]);
        assert_eq!(plan_parts(0, 5), vec![(0, 0)]);
    }

    #[tokio::test]
    async fn test_upload_multipart_assembles_object() {
        let store = MemoryStore::new();
        store.create_bucket("b", true).await.unwrap();
        let body = Bytes::from(vec![7u8; 11 * MIB]);

        let outcome = upload_multipart(&store, "b", "obj", body, 5 * MIB, None).await.unwrap();
        assert_eq!(outcome.parts, 3);
        assert!(outcome.object.etag.is_multipart());
        assert!(outcome.object.version_id.is_some());
        assert_eq!(store.version_count("b"), 1);
        assert_eq!(store.pending_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_part_aborts_session() {
        let store = MemoryStore::with_faults(Faults { fail_part: Some(2), ..Faults::default() });
        store.create_bucket("b", true).await.unwrap();
        let body = Bytes::from(vec![1u8; 11 * MIB]);

        let err = upload_multipart(&store, "b", "obj", body, 5 * MIB, None).await.unwrap_err();
        assert_eq!(err.code(), Some("InternalError"));
        assert_eq!(store.pending_upload_count(), 0);
        assert_eq!(store.version_count("b"), 0);
    }
}
