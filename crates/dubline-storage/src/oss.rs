//! Variant B: a cloud vendor's S3-compatible object storage (§4.1).
//!
//! Two independently owned client handles share the same immutable
//! settings value (§9 "cyclic ownership" note, resolved by *not* making it
//! cyclic): `client` talks to the control endpoint for put/get/delete,
//! `public_client` talks to the public CNAME domain and is used only for
//! presigning, since that is the URL the external ASR vendor must reach.

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

pub struct OssStore {
    client: Client,
    public_client: Client,
    bucket: String,
    prefix: Option<String>,
    use_ssl: bool,
}

impl OssStore {
    pub async fn connect(settings: &StorageSettings) -> StorageResult<Self> {
        let public_domain = settings
            .public_domain
            .clone()
            .ok_or_else(|| StorageError::Config("oss.public_domain is required".into()))?;
        if settings.access_key.is_empty() || settings.secret_key.is_empty() {
            return Err(StorageError::Config("oss credentials are required".into()));
        }

        let credentials = aws_sdk_s3::config::Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "dubline-static",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("oss-cn-hangzhou"))
            .credentials_provider(credentials)
            .load()
            .await;

        let client = Client::from_conf(
            S3Builder::from(&sdk_config)
                .endpoint_url(&settings.endpoint)
                .force_path_style(false)
                .build(),
        );

        let public_client = Client::from_conf(
            S3Builder::from(&sdk_config)
                .endpoint_url(&public_domain)
                .force_path_style(false)
                .build(),
        );

        Ok(Self {
            client,
            public_client,
            bucket: settings.bucket.clone(),
            prefix: settings.prefix.clone(),
            use_ssl: settings.use_ssl,
        })
    }

    fn normalize_key(&self, key: &str) -> String {
        let stripped = key.trim_start_matches('/');
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => {
                format!("{}/{}", prefix.trim_end_matches('/'), stripped)
            }
            _ => stripped.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for OssStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let key = self.normalize_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Transient(format!("oss put {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let key = self.normalize_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Transient(format!("oss read {key}: {e}")))?
                    .into_bytes();
                Ok(bytes.to_vec())
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Err(StorageError::NotFound(key))
                } else {
                    Err(StorageError::Transient(format!("oss get {key}: {service_err}")))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = self.normalize_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::Transient(format!("oss delete {key}: {e}")))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_secs: u64) -> StorageResult<String> {
        let key = self.normalize_key(key);
        let expiry = if expires_secs == 0 { 3600 } else { expires_secs };
        let presigning_cfg = PresigningConfig::expires_in(Duration::from_secs(expiry))
            .map_err(|e| StorageError::Config(format!("invalid presign expiry: {e}")))?;

        let presigned = self
            .public_client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning_cfg)
            .await
            .map_err(|e| StorageError::Transient(format!("oss presign {key}: {e}")))?;

        let url = presigned.uri().to_string();
        Ok(if self.use_ssl {
            url.replacen("http://", "https://", 1)
        } else {
            url
        })
    }

    async fn exists(&self, key: &str) -> bool {
        // Best-effort per §4.1: a real GetObject attempt, any error (not
        // just NotFound) collapses to `false`.
        self.get(key).await.is_ok()
    }
}
