//! Builds the full-length dub track (`dub.wav`) by placing each segment's
//! synthesized audio at its original timestamp, padding the gaps between
//! segments with silence so sync against the source video is preserved.

use dubline_core::PipelineError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub struct TimedSegment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub audio_path: std::path::PathBuf,
}

/// Concatenates segment audio files in `idx` order, inserting silence to
/// fill any gap between one segment's end and the next segment's start
/// (including a leading gap before the first segment).
pub async fn concat_with_silence(
    ffmpeg_path: &str,
    segments: &[TimedSegment],
    output_path: &Path,
) -> Result<(), PipelineError> {
    if segments.is_empty() {
        return Err(PipelineError::Validation("no segments to concatenate".into()));
    }

    let work_dir = output_path
        .parent()
        .ok_or_else(|| PipelineError::Internal("output path has no parent directory".into()))?;
    let list_path = work_dir.join(format!("{}_concat.txt", uuid::Uuid::new_v4()));
    let mut list_contents = String::new();

    let mut cursor_ms = 0i64;
    let mut silence_files = Vec::new();
    for segment in segments {
        let gap_ms = segment.start_ms - cursor_ms;
        if gap_ms > 0 {
            let silence_path = work_dir.join(format!("{}_silence.wav", uuid::Uuid::new_v4()));
            generate_silence(ffmpeg_path, gap_ms, &silence_path).await?;
            list_contents.push_str(&format!("file '{}'\n", silence_path.display()));
            silence_files.push(silence_path);
        }
        list_contents.push_str(&format!("file '{}'\n", segment.audio_path.display()));
        cursor_ms = segment.end_ms.max(cursor_ms);
    }

    tokio::fs::write(&list_path, &list_contents)
        .await
        .map_err(|e| PipelineError::Internal(format!("failed to write concat list: {e}")))?;

    let status = Command::new(ffmpeg_path)
        .args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(&list_path)
        .args(["-c", "copy"])
        .arg(output_path)
        .kill_on_drop(true)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| PipelineError::Transient(format!("failed to spawn ffmpeg: {e}")))?;

    let _ = tokio::fs::remove_file(&list_path).await;
    for silence_path in &silence_files {
        let _ = tokio::fs::remove_file(silence_path).await;
    }

    if !status.success() {
        return Err(PipelineError::Internal(format!("ffmpeg concat exited with {status}")));
    }
    Ok(())
}

async fn generate_silence(ffmpeg_path: &str, duration_ms: i64, output_path: &Path) -> Result<(), PipelineError> {
    let duration_secs = format!("{:.3}", duration_ms as f64 / 1000.0);
    let status = Command::new(ffmpeg_path)
        .args(["-y", "-f", "lavfi", "-i", "anullsrc=r=22050:cl=mono", "-t"])
        .arg(&duration_secs)
        .args(["-acodec", "pcm_s16le"])
        .arg(output_path)
        .kill_on_drop(true)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| PipelineError::Transient(format!("failed to spawn ffmpeg for silence: {e}")))?;

    if !status.success() {
        return Err(PipelineError::Internal(format!("ffmpeg silence generation exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_segment_list() {
        let result = tokio_test_block_on(concat_with_silence("ffmpeg", &[], Path::new("/tmp/out.wav")));
        assert!(result.is_err());
    }

    fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
    }
}
