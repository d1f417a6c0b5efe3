//! Rewrites the host portion of presigned URLs so they're reachable from
//! the external ASR vendor's network perspective, which differs from the
//! worker's internal view of the storage endpoint (§4.1).

use crate::error::StorageResult;
use crate::traits::ObjectStore;
use async_trait::async_trait;

pub struct HostOverrideStore<S: ObjectStore> {
    inner: S,
    public_host: String,
}

impl<S: ObjectStore> HostOverrideStore<S> {
    pub fn new(inner: S, public_host: impl Into<String>) -> Self {
        Self {
            inner,
            public_host: public_host.into(),
        }
    }

    fn rewrite_host(&self, url: &str) -> String {
        match url::Url::parse(url) {
            Ok(mut parsed) => {
                if let Ok(public) = url::Url::parse(&self.public_host) {
                    let _ = parsed.set_host(public.host_str());
                    if let Some(port) = public.port() {
                        let _ = parsed.set_port(Some(port));
                    }
                    let _ = parsed.set_scheme(public.scheme());
                }
                parsed.to_string()
            }
            Err(_) => url.to_string(),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for HostOverrideStore<S> {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn presign_get(&self, key: &str, expires_secs: u64) -> StorageResult<String> {
        let url = self.inner.presign_get(key, expires_secs).await?;
        Ok(self.rewrite_host(&url))
    }

    async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageResult;

    struct FakeStore;

    #[async_trait::async_trait]
    impl ObjectStore for FakeStore {
        async fn put(&self, _key: &str, _data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
            Ok(())
        }
        async fn get(&self, _key: &str) -> StorageResult<Vec<u8>> {
            Ok(vec![])
        }
        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
        async fn presign_get(&self, key: &str, _expires_secs: u64) -> StorageResult<String> {
            Ok(format!("http://internal-minio:9000/bucket/{key}"))
        }
        async fn exists(&self, _key: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn rewrites_host_and_scheme() {
        let store = HostOverrideStore::new(FakeStore, "https://minio.public.example.com");
        let url = store.presign_get("audio/t/a.wav", 60).await.unwrap();
        assert!(url.starts_with("https://minio.public.example.com"));
        assert!(url.ends_with("/bucket/audio/t/a.wav"));
    }
}
