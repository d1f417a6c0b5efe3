//! Typed views over each stage's `StageEnvelope::payload` (§6). Handlers
//! deserialize into these rather than poking at raw `serde_json::Value`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractAudioPayload {
    pub source_video_key: String,
    pub output_audio_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrPayload {
    pub audio_key: String,
    pub language: String,
    pub output_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatePayload {
    pub task_id: Uuid,
    pub segment_ids: Vec<i32>,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsPayload {
    pub task_id: Uuid,
    pub segment_id: String,
    pub segment_idx: i32,
    pub text: String,
    pub target_duration_ms: i64,
    pub speaker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxVideoPayload {
    pub task_id: Uuid,
    pub source_video_key: String,
    pub tts_audio_key: String,
    pub output_video_key: String,
}
