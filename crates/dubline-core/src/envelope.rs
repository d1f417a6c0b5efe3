use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named node in the pipeline graph, executed by one handler per delivery.
///
/// A closed set on purpose (§9): adding a stage is a compile-time change to
/// this enum and every exhaustive match over it, not a runtime registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ExtractAudio,
    Asr,
    Translate,
    Tts,
    MuxVideo,
}

impl StageName {
    pub fn routing_key(&self) -> &'static str {
        match self {
            StageName::ExtractAudio => "task.extract_audio",
            StageName::Asr => "task.asr",
            StageName::Translate => "task.translate",
            StageName::Tts => "task.tts",
            StageName::MuxVideo => "task.mux_video",
        }
    }

    pub fn from_routing_key(key: &str) -> Option<Self> {
        match key {
            "task.extract_audio" => Some(StageName::ExtractAudio),
            "task.asr" => Some(StageName::Asr),
            "task.translate" => Some(StageName::Translate),
            "task.tts" => Some(StageName::Tts),
            "task.mux_video" => Some(StageName::MuxVideo),
            _ => None,
        }
    }
}

/// The wire envelope carried on every stage message (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEnvelope {
    pub task_id: Uuid,
    pub step: StageName,
    pub attempt: u32,
    pub trace_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
}

impl StageEnvelope {
    pub fn new(task_id: Uuid, step: StageName, payload: serde_json::Value) -> Self {
        Self {
            task_id,
            step,
            attempt: 0,
            trace_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            payload,
        }
    }

    /// A redelivery carries the same trace id and task id but an
    /// incremented attempt counter — the only retry record (§4.6).
    pub fn with_incremented_attempt(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_round_trips() {
        for stage in [
            StageName::ExtractAudio,
            StageName::Asr,
            StageName::Translate,
            StageName::Tts,
            StageName::MuxVideo,
        ] {
            let key = stage.routing_key();
            assert_eq!(StageName::from_routing_key(key), Some(stage));
        }
    }

    #[test]
    fn unknown_routing_key_is_none() {
        assert_eq!(StageName::from_routing_key("task.unknown"), None);
    }

    #[test]
    fn envelope_serde_round_trip() {
        let env = StageEnvelope::new(
            Uuid::nil(),
            StageName::Asr,
            serde_json::json!({"audio_key": "audio/t/audio.wav"}),
        );
        let json = serde_json::to_string(&env).unwrap();
        let back: StageEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_id, env.task_id);
        assert_eq!(back.step, env.step);
        assert_eq!(back.attempt, 0);
    }

    #[test]
    fn increment_attempt_preserves_trace_id() {
        let env = StageEnvelope::new(Uuid::nil(), StageName::Tts, serde_json::json!({}));
        let trace = env.trace_id;
        let redelivered = env.with_incremented_attempt();
        assert_eq!(redelivered.attempt, 1);
        assert_eq!(redelivered.trace_id, trace);
    }
}
