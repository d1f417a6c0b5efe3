#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage backend unavailable: {0}")]
    Transient(String),
    #[error("bucket does not exist: {0}")]
    BucketMissing(String),
    #[error("invalid storage configuration: {0}")]
    Config(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for dubline_core::PipelineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(m) => dubline_core::PipelineError::NotFound(m),
            StorageError::Transient(m) => dubline_core::PipelineError::Transient(m),
            StorageError::BucketMissing(m) => dubline_core::PipelineError::VendorTerminal(m),
            StorageError::Config(m) => dubline_core::PipelineError::Validation(m),
        }
    }
}
