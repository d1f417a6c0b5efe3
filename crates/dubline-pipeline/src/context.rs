use dubline_bus::MessageBus;
use dubline_core::PipelineError;
use dubline_providers::asr::AsrBackend;
use dubline_providers::tts::TtsBackend;
use dubline_providers::HttpTranslationProvider;
use dubline_segments::{SegmentStore, TaskStore};
use dubline_storage::ObjectStore;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a stage handler needs, shared read-only across every
/// concurrently-running consumer task.
pub struct HandlerContext {
    pub storage: Arc<dyn ObjectStore>,
    pub bus: Arc<dyn MessageBus>,
    pub segments: Arc<dyn SegmentStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub asr: Arc<AsrBackend>,
    pub tts: Arc<TtsBackend>,
    pub translation: Arc<HttpTranslationProvider>,
    pub ffmpeg_path: String,
    pub cancel: CancellationToken,
}

impl HandlerContext {
    /// Races `fut` against cooperative cancellation (§5). If `cancel` fires
    /// first, `fut` is dropped at its current suspension point and this
    /// returns `PipelineError::Canceled` instead of the handler's own
    /// result — callers propagate it unchanged so the dispatcher can
    /// requeue the delivery without marking the task failed.
    pub async fn cancellable<T, F>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Canceled),
            result = fut => result,
        }
    }
}
