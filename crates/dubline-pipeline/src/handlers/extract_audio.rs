use crate::context::HandlerContext;
use dubline_core::payloads::ExtractAudioPayload;
use dubline_core::{PipelineError, StageEnvelope, StageName};
use std::process::Stdio;
use tokio::process::Command;
use uuid::Uuid;

pub async fn handle(ctx: &HandlerContext, task_id: Uuid, payload: &ExtractAudioPayload) -> Result<(), PipelineError> {
    let video_bytes = ctx.storage.get(&payload.source_video_key).await?;

    let video_path = std::env::temp_dir().join(format!("{task_id}_video.mp4"));
    let audio_path = std::env::temp_dir().join(format!("{task_id}_audio.wav"));
    tokio::fs::write(&video_path, &video_bytes)
        .await
        .map_err(|e| PipelineError::Internal(format!("failed to write temp video: {e}")))?;

    let status = ctx
        .cancellable(async {
            Command::new(&ctx.ffmpeg_path)
                .arg("-i")
                .arg(&video_path)
                .args(["-vn", "-acodec", "pcm_s16le", "-ar", "22050", "-ac", "1", "-y"])
                .arg(&audio_path)
                .kill_on_drop(true)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| PipelineError::Transient(format!("failed to spawn ffmpeg: {e}")))
        })
        .await?;

    let _ = tokio::fs::remove_file(&video_path).await;

    if !status.success() {
        let _ = tokio::fs::remove_file(&audio_path).await;
        return Err(PipelineError::Internal(format!("ffmpeg extraction exited with {status}")));
    }

    let audio_bytes = tokio::fs::read(&audio_path)
        .await
        .map_err(|e| PipelineError::Internal(format!("failed to read extracted audio: {e}")))?;
    let _ = tokio::fs::remove_file(&audio_path).await;

    ctx.storage.put(&payload.output_audio_key, audio_bytes, "audio/wav").await?;

    let task = ctx
        .tasks
        .get(task_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("task {task_id} not found")))?;

    let asr_payload = dubline_core::payloads::AsrPayload {
        audio_key: payload.output_audio_key.clone(),
        language: task.target_language.clone(),
        output_key: format!("asr/{task_id}/asr.json"),
    };
    let envelope = StageEnvelope::new(task_id, StageName::Asr, serde_json::to_value(asr_payload)?);
    ctx.bus.publish(StageName::Asr.routing_key(), &envelope).await?;

    Ok(())
}
