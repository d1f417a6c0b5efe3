use crate::context::HandlerContext;
use dubline_core::payloads::{AsrPayload, TranslatePayload};
use dubline_core::{PipelineError, StageEnvelope, StageName};
use dubline_providers::asr::AsrProvider;
use uuid::Uuid;

pub async fn handle(ctx: &HandlerContext, task_id: Uuid, payload: &AsrPayload) -> Result<(), PipelineError> {
    let audio_url = ctx.storage.presign_get(&payload.audio_key, 3600).await?;
    let result = ctx
        .cancellable(async { ctx.asr.recognize(&audio_url, &payload.language).await.map_err(PipelineError::from) })
        .await?;

    if result.single_segment_degraded {
        tracing::warn!(
            task_id = %task_id,
            "asr backend returned no per-utterance timestamps; synthesizing a single whole-clip segment"
        );
    }

    ctx.storage
        .put(&payload.output_key, serde_json::to_vec(&result)?, "application/json")
        .await?;

    let mut segment_ids = Vec::with_capacity(result.segments.len());
    for segment in &result.segments {
        ctx.segments
            .upsert_source(task_id, segment.idx, segment.start_ms, segment.end_ms, &segment.text)
            .await?;
        segment_ids.push(segment.idx);
    }

    let task = ctx
        .tasks
        .get(task_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("task {task_id} not found")))?;

    let translate_payload = TranslatePayload {
        task_id,
        segment_ids,
        source_language: result.language,
        target_language: task.target_language,
    };
    let envelope = StageEnvelope::new(task_id, StageName::Translate, serde_json::to_value(translate_payload)?);
    ctx.bus.publish(StageName::Translate.routing_key(), &envelope).await?;

    Ok(())
}
