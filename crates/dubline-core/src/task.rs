use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The task-level status field and its legal transitions.
///
/// Gates every external query: an API collaborator reads this field (not
/// the presence of an output key) to decide whether a task is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    /// `failed` is reachable from any non-terminal state; `done` only from
    /// `processing`; `processing` only from `queued`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (_, Failed) => !matches!(self, Done | Failed),
            (Queued, Processing) => true,
            (Processing, Done) => true,
            (same, next) if *same == next => false,
            _ => false,
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "processing" => Ok(TaskStatus::Processing),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The top-level unit of work. Created by the (out-of-scope) API
/// collaborator; mutated only by the dispatcher (status) and the terminal
/// handler (output key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub source_video_key: String,
    pub target_language: String,
    pub status: TaskStatus,
    pub output_video_key: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Task {
    pub fn new(source_video_key: impl Into<String>, target_language: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::now_v7(),
            source_video_key: source_video_key.into(),
            target_language: target_language.into(),
            status: TaskStatus::Queued,
            output_video_key: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Mirrors the out-of-scope API collaborator's error surface (§7): it reads
/// task status and maps it to one of these two values. Defined here purely
/// as a documented contract — no HTTP handler lives in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("task not found")]
    TaskNotFound,
    #[error("task not completed")]
    TaskNotCompleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_can_become_processing_or_failed() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Done));
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        assert!(!TaskStatus::Done.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Done.can_transition_to(TaskStatus::Processing));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Processing));
    }

    #[test]
    fn display_and_fromstr_round_trip() {
        for s in [
            TaskStatus::Queued,
            TaskStatus::Processing,
            TaskStatus::Done,
            TaskStatus::Failed,
        ] {
            let text = s.to_string();
            let parsed: TaskStatus = text.parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
