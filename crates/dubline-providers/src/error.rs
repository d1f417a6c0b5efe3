use dubline_core::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum AsrError {
    #[error("asr request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("asr transient error: {0}")]
    Transient(String),
    #[error("asr vendor terminal error (code={code}): {message}")]
    VendorTerminal { code: String, message: String },
}

impl From<AsrError> for PipelineError {
    fn from(e: AsrError) -> Self {
        match e {
            AsrError::Timeout(d) => PipelineError::Deadline(d),
            AsrError::Transient(m) => PipelineError::Transient(m),
            AsrError::VendorTerminal { code, message } => {
                PipelineError::VendorTerminal(format!("{code}: {message}"))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("tts transient error: {0}")]
    Transient(String),
    #[error("tts vendor terminal error: {0}")]
    VendorTerminal(String),
}

impl From<TtsError> for PipelineError {
    fn from(e: TtsError) -> Self {
        match e {
            TtsError::Transient(m) => PipelineError::Transient(m),
            TtsError::VendorTerminal(m) => PipelineError::VendorTerminal(m),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation transient error: {0}")]
    Transient(String),
    #[error("translation vendor terminal error: {0}")]
    VendorTerminal(String),
}

impl From<TranslationError> for PipelineError {
    fn from(e: TranslationError) -> Self {
        match e {
            TranslationError::Transient(m) => PipelineError::Transient(m),
            TranslationError::VendorTerminal(m) => PipelineError::VendorTerminal(m),
        }
    }
}
