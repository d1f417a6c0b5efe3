#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("publish timed out after {0:?}")]
    PublishTimeout(std::time::Duration),
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("broker channel error: {0}")]
    Channel(String),
    #[error("envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type BusResult<T> = Result<T, BusError>;

impl From<BusError> for dubline_core::PipelineError {
    fn from(e: BusError) -> Self {
        match e {
            BusError::PublishTimeout(d) => dubline_core::PipelineError::Deadline(d),
            BusError::Connection(m) => dubline_core::PipelineError::Transient(m),
            BusError::Channel(m) => dubline_core::PipelineError::Transient(m),
            BusError::Serialization(e) => dubline_core::PipelineError::Internal(e.to_string()),
        }
    }
}
