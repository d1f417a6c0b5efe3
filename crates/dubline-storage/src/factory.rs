//! Selects the backend from configuration, applying the fallback policy
//! (§4.1, §9 S5): if `oss` is selected but its required settings are
//! missing, fall back to `minio` so the worker still starts.

use crate::error::StorageResult;
use crate::host_override::HostOverrideStore;
use crate::oss::OssStore;
use crate::s3_compatible::S3CompatibleStore;
use crate::traits::ObjectStore;
use dubline_config::{StorageBackend, StorageSettings};
use std::sync::Arc;

pub async fn build(settings: &StorageSettings) -> StorageResult<Arc<dyn ObjectStore>> {
    match settings.backend {
        StorageBackend::Oss => match OssStore::connect(settings).await {
            Ok(store) => Ok(Arc::new(store)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "oss backend unavailable, falling back to minio to keep the worker running"
                );
                build_minio(settings).await
            }
        },
        StorageBackend::Minio => build_minio(settings).await,
    }
}

async fn build_minio(settings: &StorageSettings) -> StorageResult<Arc<dyn ObjectStore>> {
    let store = S3CompatibleStore::connect(settings).await?;
    match &settings.public_endpoint {
        Some(public) => Ok(Arc::new(HostOverrideStore::new(store, public.clone()))),
        None => Ok(Arc::new(store)),
    }
}
