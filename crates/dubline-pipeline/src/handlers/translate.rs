use crate::context::HandlerContext;
use dubline_core::payloads::{TranslatePayload, TtsPayload};
use dubline_core::{PipelineError, StageEnvelope, StageName};
use dubline_providers::translation::TranslationProvider;
use uuid::Uuid;

pub async fn handle(ctx: &HandlerContext, task_id: Uuid, payload: &TranslatePayload) -> Result<(), PipelineError> {
    let segments = ctx.segments.list_source(task_id).await?;
    let wanted: std::collections::HashSet<i32> = payload.segment_ids.iter().copied().collect();
    let wanted_segments: Vec<_> = segments.into_iter().filter(|s| wanted.contains(&s.idx)).collect();
    let texts: Vec<String> = wanted_segments.iter().map(|s| s.source_text.clone()).collect();

    let translated = ctx
        .cancellable(async {
            ctx.translation
                .translate_batch(&texts, &payload.source_language, &payload.target_language)
                .await
                .map_err(PipelineError::from)
        })
        .await?;

    for (segment, translated_text) in wanted_segments.iter().zip(translated.into_iter()) {
        ctx.segments.set_translation(task_id, segment.idx, &translated_text).await?;

        let tts_payload = TtsPayload {
            task_id,
            segment_id: format!("seg-{}", segment.idx),
            segment_idx: segment.idx,
            text: translated_text,
            target_duration_ms: segment.duration_ms(),
            speaker_id: "default".to_string(),
        };
        let envelope = StageEnvelope::new(task_id, StageName::Tts, serde_json::to_value(tts_payload)?);
        ctx.bus.publish(StageName::Tts.routing_key(), &envelope).await?;
    }

    Ok(())
}
