use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-utterance row keyed by (task_id, idx). Created in bulk by the asr
/// handler, then mutated in place by translate and tts — never replaced,
/// so upserts must never clear a field the new write doesn't carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub task_id: Uuid,
    pub idx: i32,
    pub start_ms: i64,
    pub end_ms: i64,
    pub source_text: String,
    pub translated_text: Option<String>,
    pub tts_audio_key: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Segment {
    pub fn duration_ms(&self) -> i64 {
        (self.end_ms - self.start_ms).max(0)
    }

    /// Invariant (§3): translated text is only meaningful once source text
    /// exists, and TTS key only once translated text exists. Upserts that
    /// violate this ordering indicate a handler bug upstream, not a storage
    /// concern, so this is a read-only assertion helper for tests.
    pub fn respects_write_order(&self) -> bool {
        if self.tts_audio_key.is_some() && self.translated_text.is_none() {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg() -> Segment {
        Segment {
            task_id: Uuid::now_v7(),
            idx: 0,
            start_ms: 0,
            end_ms: 1500,
            source_text: "你好，世界".into(),
            translated_text: None,
            tts_audio_key: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn duration_is_end_minus_start() {
        assert_eq!(seg().duration_ms(), 1500);
    }

    #[test]
    fn tts_key_without_translation_violates_write_order() {
        let mut s = seg();
        s.tts_audio_key = Some("tts/t/segment_0.wav".into());
        assert!(!s.respects_write_order());
    }

    #[test]
    fn full_pipeline_order_is_valid() {
        let mut s = seg();
        s.translated_text = Some("Hello, world".into());
        s.tts_audio_key = Some("tts/t/segment_0.wav".into());
        assert!(s.respects_write_order());
    }
}
