pub mod aliyun;
pub mod volcengine;

use crate::error::AsrError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrSegment {
    pub idx: i32,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub speaker: Option<String>,
    pub emotion: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrResult {
    pub language: String,
    pub duration_ms: Option<i64>,
    pub segments: Vec<AsrSegment>,
    /// Set when the vendor does not return per-utterance timestamps and a
    /// single whole-audio segment was synthesized in its place.
    #[serde(default)]
    pub single_segment_degraded: bool,
}

#[async_trait]
pub trait AsrProvider: Send + Sync + 'static {
    async fn recognize(&self, audio_url: &str, language: &str) -> Result<AsrResult, AsrError>;
}

/// A closed tagged-variant set: a new vendor is a new arm here and in
/// `build`, not a runtime-registered trait object.
pub enum AsrBackend {
    Volcengine(volcengine::VolcengineAsr),
    Aliyun(aliyun::AliyunAsr),
}

#[async_trait]
impl AsrProvider for AsrBackend {
    async fn recognize(&self, audio_url: &str, language: &str) -> Result<AsrResult, AsrError> {
        match self {
            AsrBackend::Volcengine(p) => p.recognize(audio_url, language).await,
            AsrBackend::Aliyun(p) => p.recognize(audio_url, language).await,
        }
    }
}

pub fn build(settings: &dubline_config::AsrSettings) -> AsrBackend {
    match settings.backend {
        dubline_config::AsrBackend::Volcengine => {
            AsrBackend::Volcengine(volcengine::VolcengineAsr::new(settings.clone()))
        }
        dubline_config::AsrBackend::Aliyun => {
            AsrBackend::Aliyun(aliyun::AliyunAsr::new(settings.clone()))
        }
    }
}
