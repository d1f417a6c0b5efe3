use crate::error::StorageResult;
use async_trait::async_trait;

/// Unified object-store contract over two incompatible backends (§4.1).
///
/// `get` on a missing key returns `StorageError::NotFound`; other failures
/// surface as `StorageError::Transient`. `exists` is best-effort: any
/// ambiguous error collapses to `false` rather than propagating, per spec.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn presign_get(&self, key: &str, expires_secs: u64) -> StorageResult<String>;

    async fn exists(&self, key: &str) -> bool;
}
