// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! S3 object storage access.
//!
//! Thin wrapper over `aws-sdk-s3` scoped to one bucket: bucket probing for
//! health checks, payload upload, streamed download and presigned GET
//! URLs. Endpoint override and path-style addressing support MinIO-style
//! deployments.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::Settings;

/// Object storage errors, reduced to the operation that failed.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("bucket not reachable: {0}")]
    Head(String),
    #[error("cannot write object: {0}")]
    Put(String),
    #[error("cannot read object: {0}")]
    Get(String),
    #[error("cannot presign object URL: {0}")]
    Presign(String),
}

/// S3 client bound to the configured bucket.
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    /// Build a store from settings.
    ///
    /// Returns `None` when no bucket is configured; S3-backed endpoints
    /// then report a configuration error.
    pub async fn from_settings(settings: &Settings) -> Option<Self> {
        let bucket = settings.s3_bucket.clone()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &settings.aws_region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.s3_endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Some(Self {
            client: Client::from_conf(builder.build()),
            bucket,
        })
    }

    /// The configured bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Probe the bucket (existence + authorization).
    pub async fn head_bucket(&self) -> Result<(), ObjectStoreError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Head(e.to_string()))?;
        Ok(())
    }

    /// Write an object and return its `s3://` URI.
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Put(e.to_string()))?;

        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    /// Read an object for streaming. The returned output carries the body
    /// stream and content type.
    pub async fn get_object(
        &self,
        key: &str,
    ) -> Result<aws_sdk_s3::operation::get_object::GetObjectOutput, ObjectStoreError> {
        self.client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Get(e.to_string()))
    }

    /// Generate a time-limited presigned GET URL for an object.
    pub async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError> {
        let config = PresigningConfig::expires_in(ttl)
            .map_err(|e| ObjectStoreError::Presign(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| ObjectStoreError::Presign(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

/// Join a key prefix and an object name without doubling separators.
pub fn join_key(prefix: &str, name: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_key_normalizes_separators() {
        assert_eq!(join_key("enroll/", "file.json"), "enroll/file.json");
        assert_eq!(join_key("enroll", "file.json"), "enroll/file.json");
        assert_eq!(join_key("binaries/", "/nested/tool.bin"), "binaries/nested/tool.bin");
    }

    #[tokio::test]
    async fn from_settings_requires_bucket() {
        let settings = crate::testing::test_settings();
        assert!(ObjectStore::from_settings(&settings).await.is_none());
    }
}
