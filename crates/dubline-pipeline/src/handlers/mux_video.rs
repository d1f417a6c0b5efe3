use crate::audio::{concat_with_silence, TimedSegment};
use crate::context::HandlerContext;
use dubline_core::payloads::MuxVideoPayload;
use dubline_core::{PipelineError, TaskStatus};
use std::process::Stdio;
use tokio::process::Command;
use uuid::Uuid;

pub async fn handle(ctx: &HandlerContext, task_id: Uuid, payload: &MuxVideoPayload) -> Result<(), PipelineError> {
    let segments = ctx.segments.list_source(task_id).await?;
    let work_dir = std::env::temp_dir().join(format!("dubline_mux_{task_id}"));
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(|e| PipelineError::Internal(format!("failed to create work dir: {e}")))?;

    let mut timed_segments = Vec::new();
    for segment in segments.iter().filter(|s| s.tts_audio_key.is_some()) {
        let key = segment.tts_audio_key.as_ref().unwrap();
        let bytes = ctx.storage.get(key).await?;
        let path = work_dir.join(format!("segment_{}.wav", segment.idx));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| PipelineError::Internal(format!("failed to write segment audio: {e}")))?;
        timed_segments.push(TimedSegment { start_ms: segment.start_ms, end_ms: segment.end_ms, audio_path: path });
    }
    timed_segments.sort_by_key(|s| s.start_ms);

    let dub_path = work_dir.join("dub.wav");
    ctx.cancellable(concat_with_silence(&ctx.ffmpeg_path, &timed_segments, &dub_path)).await?;

    let dub_bytes = tokio::fs::read(&dub_path)
        .await
        .map_err(|e| PipelineError::Internal(format!("failed to read dub track: {e}")))?;
    ctx.storage.put(&payload.tts_audio_key, dub_bytes, "audio/wav").await?;

    let video_bytes = ctx.storage.get(&payload.source_video_key).await?;
    let video_path = work_dir.join("source.mp4");
    tokio::fs::write(&video_path, &video_bytes)
        .await
        .map_err(|e| PipelineError::Internal(format!("failed to write source video: {e}")))?;

    let output_path = work_dir.join("final.mp4");
    let status = ctx
        .cancellable(async {
            Command::new(&ctx.ffmpeg_path)
                .args(["-y", "-i"])
                .arg(&video_path)
                .arg("-i")
                .arg(&dub_path)
                .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", "aac", "-shortest"])
                .arg(&output_path)
                .kill_on_drop(true)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| PipelineError::Transient(format!("failed to spawn ffmpeg mux: {e}")))
        })
        .await?;

    if !status.success() {
        let _ = tokio::fs::remove_dir_all(&work_dir).await;
        return Err(PipelineError::Internal(format!("ffmpeg mux exited with {status}")));
    }

    let output_bytes = tokio::fs::read(&output_path)
        .await
        .map_err(|e| PipelineError::Internal(format!("failed to read muxed output: {e}")))?;
    ctx.storage.put(&payload.output_video_key, output_bytes, "video/mp4").await?;

    let _ = tokio::fs::remove_dir_all(&work_dir).await;

    ctx.tasks.set_output_key(task_id, &payload.output_video_key).await?;
    ctx.tasks.set_status(task_id, TaskStatus::Done).await?;

    Ok(())
}
