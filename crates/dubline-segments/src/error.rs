#[derive(Debug, thiserror::Error)]
pub enum SegmentStoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type SegmentStoreResult<T> = Result<T, SegmentStoreError>;

impl From<SegmentStoreError> for dubline_core::PipelineError {
    fn from(e: SegmentStoreError) -> Self {
        match e {
            SegmentStoreError::TaskNotFound(m) => dubline_core::PipelineError::NotFound(m),
            SegmentStoreError::Database(e) => dubline_core::PipelineError::Transient(e.to_string()),
        }
    }
}
