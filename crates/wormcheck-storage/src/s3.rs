// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! [`ObjectStore`] implementation backed by the AWS SDK for Rust.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart as SdkCompletedPart,
    CreateBucketConfiguration, ObjectLockLegalHold, ObjectLockLegalHoldStatus, ObjectLockMode,
    ObjectLockRetention, ObjectLockRetentionMode,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;
use wormcheck_core::{ETag, EndpointConfig, ObjectLock, RetentionMode, RetentionRecord};

use crate::backend::{
    CompletedPart, DeleteObjectResult, ObjectStore, PendingUpload, PutObjectResult, VersionEntry,
};
use crate::error::{StoreError, StoreResult};

/// Region that must not be sent as a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// An S3-compatible endpoint reached through `aws-sdk-s3`.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    /// Builds a client from endpoint settings with static credentials.
    #[must_use]
    pub fn new(endpoint: &EndpointConfig) -> Self {
        let credentials = Credentials::new(
            endpoint.access_key.clone(),
            endpoint.secret_key.clone(),
            None,
            None,
            "wormcheck",
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(endpoint.region.clone()))
            .endpoint_url(&endpoint.url)
            .credentials_provider(credentials)
            .force_path_style(endpoint.force_path_style)
            .response_checksum_validation(
                aws_sdk_s3::config::ResponseChecksumValidation::WhenRequired,
            )
            .build();

        Self { client: Client::from_conf(config), region: endpoint.region.clone() }
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Converts an SDK failure into a [`StoreError`].
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err {
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            let e = ctx.err();
            StoreError::Service {
                status,
                code: e.code().unwrap_or("Unknown").to_string(),
                message: e.message().unwrap_or_default().to_string(),
            }
        }
        other => StoreError::Transport(DisplayErrorContext(&other).to_string()),
    }
}

fn to_sdk_datetime(at: DateTime<Utc>) -> SdkDateTime {
    SdkDateTime::from_secs(at.timestamp())
}

fn from_sdk_datetime(at: &SdkDateTime) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(at.secs(), at.subsec_nanos())
        .ok_or_else(|| StoreError::Transport(format!("retain-until date out of range: {at:?}")))
}

impl ObjectStore for S3Store {
    async fn create_bucket(&self, bucket: &str, object_lock: bool) -> StoreResult<()> {
        let mut req = self.client.create_bucket().bucket(bucket);
        if object_lock {
            req = req.object_lock_enabled_for_bucket(true);
        }
        if self.region != DEFAULT_REGION {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        req.send().await.map_err(map_sdk_error)?;
        debug!(bucket, object_lock, "Created bucket");
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.client.delete_bucket().bucket(bucket).send().await.map_err(map_sdk_error)?;
        Ok(())
    }

    async fn list_object_versions(&self, bucket: &str) -> StoreResult<Vec<VersionEntry>> {
        let mut entries = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let out = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(map_sdk_error)?;

            entries.extend(out.versions().iter().map(|v| VersionEntry {
                key: v.key().unwrap_or_default().to_string(),
                version_id: v.version_id().unwrap_or("null").to_string(),
                is_delete_marker: false,
            }));
            entries.extend(out.delete_markers().iter().map(|m| VersionEntry {
                key: m.key().unwrap_or_default().to_string(),
                version_id: m.version_id().unwrap_or("null").to_string(),
                is_delete_marker: true,
            }));

            if out.is_truncated() != Some(true) {
                break;
            }
            key_marker = out.next_key_marker().map(str::to_string);
            version_marker = out.next_version_id_marker().map(str::to_string);
            if key_marker.is_none() && version_marker.is_none() {
                break;
            }
        }

        Ok(entries)
    }

    async fn list_multipart_uploads(&self, bucket: &str) -> StoreResult<Vec<PendingUpload>> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_marker: Option<String> = None;

        loop {
            let out = self
                .client
                .list_multipart_uploads()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_marker.take())
                .send()
                .await
                .map_err(map_sdk_error)?;

            uploads.extend(out.uploads().iter().filter_map(|u| {
                Some(PendingUpload {
                    key: u.key()?.to_string(),
                    upload_id: u.upload_id()?.to_string(),
                })
            }));

            if out.is_truncated() != Some(true) {
                break;
            }
            key_marker = out.next_key_marker().map(str::to_string);
            upload_marker = out.next_upload_id_marker().map(str::to_string);
            if key_marker.is_none() && upload_marker.is_none() {
                break;
            }
        }

        Ok(uploads)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        lock: Option<&ObjectLock>,
    ) -> StoreResult<PutObjectResult> {
        let mut req =
            self.client.put_object().bucket(bucket).key(key).body(ByteStream::from(body));
        if let Some(lock) = lock {
            req = req
                .object_lock_mode(ObjectLockMode::from(lock.mode.as_str()))
                .object_lock_retain_until_date(to_sdk_datetime(lock.retain_until));
        }
        let out = req.send().await.map_err(map_sdk_error)?;
        Ok(PutObjectResult {
            etag: ETag::new(out.e_tag().unwrap_or_default()),
            version_id: out.version_id().map(str::to_string),
        })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_governance: bool,
    ) -> StoreResult<DeleteObjectResult> {
        let mut req = self.client.delete_object().bucket(bucket).key(key);
        if let Some(vid) = version_id {
            req = req.version_id(vid);
        }
        if bypass_governance {
            req = req.bypass_governance_retention(true);
        }
        let out = req.send().await.map_err(map_sdk_error)?;
        Ok(DeleteObjectResult {
            version_id: out.version_id().map(str::to_string),
            is_delete_marker: out.delete_marker().unwrap_or(false),
        })
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<RetentionRecord> {
        let out = self
            .client
            .get_object_retention()
            .bucket(bucket)
            .key(key)
            .version_id(version_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let Some(retention) = out.retention() else {
            return Ok(RetentionRecord::none());
        };
        let mode = retention
            .mode()
            .map(|m| {
                RetentionMode::parse(m.as_str()).ok_or_else(|| {
                    StoreError::Transport(format!("unknown retention mode: {}", m.as_str()))
                })
            })
            .transpose()?
            .unwrap_or_default();
        let retain_until = retention.retain_until_date().map(from_sdk_datetime).transpose()?;
        Ok(RetentionRecord::proposed(mode, retain_until))
    }

    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        retention: &RetentionRecord,
        bypass_governance: bool,
    ) -> StoreResult<()> {
        let mut body = ObjectLockRetention::builder();
        if retention.mode.is_locking() {
            body = body.mode(ObjectLockRetentionMode::from(retention.mode.as_str()));
        }
        if let Some(until) = retention.retain_until {
            body = body.retain_until_date(to_sdk_datetime(until));
        }

        let mut req = self
            .client
            .put_object_retention()
            .bucket(bucket)
            .key(key)
            .version_id(version_id)
            .retention(body.build());
        if bypass_governance {
            req = req.bypass_governance_retention(true);
        }
        req.send().await.map_err(map_sdk_error)?;
        Ok(())
    }

    async fn get_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> StoreResult<bool> {
        let out = self
            .client
            .get_object_legal_hold()
            .bucket(bucket)
            .key(key)
            .version_id(version_id)
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(out.legal_hold().and_then(|h| h.status()) == Some(&ObjectLockLegalHoldStatus::On))
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        on: bool,
    ) -> StoreResult<()> {
        let status =
            if on { ObjectLockLegalHoldStatus::On } else { ObjectLockLegalHoldStatus::Off };
        self.client
            .put_object_legal_hold()
            .bucket(bucket)
            .key(key)
            .version_id(version_id)
            .legal_hold(ObjectLockLegalHold::builder().status(status).build())
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        lock: Option<&ObjectLock>,
    ) -> StoreResult<String> {
        let mut req = self.client.create_multipart_upload().bucket(bucket).key(key);
        if let Some(lock) = lock {
            req = req
                .object_lock_mode(ObjectLockMode::from(lock.mode.as_str()))
                .object_lock_retain_until_date(to_sdk_datetime(lock.retain_until));
        }
        let out = req.send().await.map_err(map_sdk_error)?;
        out.upload_id()
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::Transport("CreateMultipartUpload returned no upload ID".into())
            })
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StoreResult<ETag> {
        let out = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(map_sdk_error)?;
        out.e_tag()
            .map(ETag::from)
            .ok_or_else(|| {
                StoreError::Transport(format!("UploadPart {part_number} returned no ETag"))
            })
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<PutObjectResult> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|p| {
                        SdkCompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(p.etag.as_str())
                            .build()
                    })
                    .collect(),
            ))
            .build();

        let out = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(PutObjectResult {
            etag: ETag::new(out.e_tag().unwrap_or_default()),
            version_id: out.version_id().map(str::to_string),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }
}
