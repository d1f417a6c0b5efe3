use crate::context::HandlerContext;
use dubline_core::payloads::{MuxVideoPayload, TtsPayload};
use dubline_core::{PipelineError, StageEnvelope, StageName};
use dubline_providers::tts::{SynthesisRequest, TtsProvider};
use uuid::Uuid;

/// Baseline reading rate used to size a segment's text for its allotted
/// window. ~15 characters/second is a rough cross-language estimate for
/// spoken delivery; the multiplier is clamped to stay within what TTS
/// vendors' prosody controls accept.
const BASELINE_CHARS_PER_SEC: f64 = 15.0;
const MIN_SPEED: f32 = 0.5;
const MAX_SPEED: f32 = 2.0;

/// Estimates the playback-rate multiplier needed to fit `text` into
/// `target_duration_ms`, so dubbed speech doesn't drift out of sync with
/// the source video's segment timing (§4.5, §6).
fn estimate_speed(text: &str, target_duration_ms: i64) -> f32 {
    if target_duration_ms <= 0 {
        return 1.0;
    }
    let char_count = text.chars().count() as f64;
    if char_count == 0.0 {
        return 1.0;
    }
    let natural_secs = char_count / BASELINE_CHARS_PER_SEC;
    let target_secs = target_duration_ms as f64 / 1000.0;
    let speed = (natural_secs / target_secs) as f32;
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

pub async fn handle(ctx: &HandlerContext, task_id: Uuid, payload: &TtsPayload) -> Result<(), PipelineError> {
    let request = SynthesisRequest {
        text: payload.text.clone(),
        speaker_id: Some(payload.speaker_id.clone()),
        prompt_audio_url: None,
        speed: estimate_speed(&payload.text, payload.target_duration_ms),
    };
    let audio = ctx
        .cancellable(async { ctx.tts.synthesize(&request).await.map_err(PipelineError::from) })
        .await?;

    let key = format!("tts/{task_id}/segment_{}.wav", payload.segment_idx);
    ctx.storage.put(&key, audio, "audio/wav").await?;

    let outcome = ctx
        .segments
        .set_tts_key_and_count_remaining(task_id, payload.segment_idx, &key)
        .await?;

    if outcome.fires_barrier() {
        let source_video_key = ctx.segments.get_source_key(task_id).await?;
        let mux_payload = MuxVideoPayload {
            task_id,
            source_video_key,
            tts_audio_key: format!("tts/{task_id}/dub.wav"),
            output_video_key: format!("outputs/{task_id}/final.mp4"),
        };
        let envelope = StageEnvelope::new(task_id, StageName::MuxVideo, serde_json::to_value(mux_payload)?);
        ctx.bus.publish(StageName::MuxVideo.routing_key(), &envelope).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_in_long_window_clamps_to_min_speed() {
        let speed = estimate_speed("hi", 10_000);
        assert_eq!(speed, MIN_SPEED);
    }

    #[test]
    fn long_text_in_short_window_clamps_to_max_speed() {
        let speed = estimate_speed(&"word ".repeat(200), 500);
        assert_eq!(speed, MAX_SPEED);
    }

    #[test]
    fn matched_pace_is_close_to_one() {
        let text = "a".repeat(15);
        let speed = estimate_speed(&text, 1000);
        assert!((speed - 1.0).abs() < 0.01);
    }

    #[test]
    fn zero_duration_falls_back_to_natural_pace() {
        assert_eq!(estimate_speed("anything", 0), 1.0);
    }
}
