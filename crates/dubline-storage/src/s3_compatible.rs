//! Variant A: self-hosted S3-compatible object storage (§4.1).
//!
//! The worker side requires the bucket to already exist — it runs with
//! narrower credentials than the API side, which is responsible for
//! provisioning the bucket (out of scope here).

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Builder as S3Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use dubline_config::StorageSettings;
use std::time::Duration;

pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    /// Connects against `settings.endpoint` with path-style addressing
    /// (required by MinIO-family servers). If `existing_bucket_only` is
    /// set, verifies the bucket exists via `HeadBucket` and fails rather
    /// than creating it.
    pub async fn connect(settings: &StorageSettings) -> StorageResult<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                settings.access_key.clone(),
                settings.secret_key.clone(),
                None,
                None,
                "dubline-static",
            ))
            .load()
            .await;

        let s3_config = S3Builder::from(&sdk_config)
            .endpoint_url(&settings.endpoint)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);
        let bucket = settings.bucket.clone();

        if settings.existing_bucket_only {
            client
                .head_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|_| StorageError::BucketMissing(bucket.clone()))?;
        }

        Ok(Self { client, bucket })
    }

    fn normalize_key(key: &str) -> &str {
        key.trim_start_matches('/')
    }
}

#[async_trait]
impl ObjectStore for S3CompatibleStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let key = Self::normalize_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Transient(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let key = Self::normalize_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Transient(format!("read body {key}: {e}")))?
                    .into_bytes();
                Ok(bytes.to_vec())
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Err(StorageError::NotFound(key.to_string()))
                } else {
                    Err(StorageError::Transient(format!("get {key}: {service_err}")))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = Self::normalize_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Transient(format!("delete {key}: {e}")))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_secs: u64) -> StorageResult<String> {
        let key = Self::normalize_key(key);
        let presigning_cfg = PresigningConfig::expires_in(Duration::from_secs(expires_secs))
            .map_err(|e| StorageError::Config(format!("invalid presign expiry: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_cfg)
            .await
            .map_err(|e| StorageError::Transient(format!("presign {key}: {e}")))?;

        Ok(presigned.uri().to_string())
    }

    async fn exists(&self, key: &str) -> bool {
        let key = Self::normalize_key(key);
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .is_ok()
    }
}
