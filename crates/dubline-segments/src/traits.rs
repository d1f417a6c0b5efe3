use crate::error::SegmentStoreResult;
use async_trait::async_trait;
use dubline_core::{Segment, Task, TaskStatus};
use uuid::Uuid;

/// Result of a `set_tts_key_and_count_remaining` call.
///
/// `newly_set` distinguishes "this call is the one that filled in the last
/// missing key" from "every key, including this one, was already set
/// before this call ran" — the latter happens on re-delivery of an
/// already-processed `task.tts` message and must not re-arm the barrier
/// (§8 invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierOutcome {
    pub remaining: i64,
    pub newly_set: bool,
}

impl BarrierOutcome {
    /// Whether this call is the one entitled to publish `task.mux_video`.
    pub fn fires_barrier(&self) -> bool {
        self.newly_set && self.remaining == 0
    }
}

/// The transactional per-segment surface (§4.3). All writes are
/// serialized at (task_id, idx) granularity by the storage engine, not by
/// an in-process lock.
#[async_trait]
pub trait SegmentStore: Send + Sync + 'static {
    /// Inserts or updates the source fields; never clears translated/TTS
    /// fields that may already be present on a re-delivery.
    async fn upsert_source(
        &self,
        task_id: Uuid,
        idx: i32,
        start_ms: i64,
        end_ms: i64,
        text: &str,
    ) -> SegmentStoreResult<()>;

    async fn set_translation(&self, task_id: Uuid, idx: i32, text: &str) -> SegmentStoreResult<()>;

    /// Sets the TTS audio key — only if it isn't already set — and, in the
    /// same transaction, reads the number of sibling segments still
    /// missing a TTS key. The fan-in barrier: exactly one caller observes
    /// `fires_barrier() == true`.
    async fn set_tts_key_and_count_remaining(
        &self,
        task_id: Uuid,
        idx: i32,
        key: &str,
    ) -> SegmentStoreResult<BarrierOutcome>;

    async fn list_source(&self, task_id: Uuid) -> SegmentStoreResult<Vec<Segment>>;

    async fn count_missing_tts(&self, task_id: Uuid) -> SegmentStoreResult<i64>;

    /// The source-video key for the mux stage. Segments don't own this
    /// field; it's read through from the owning task row.
    async fn get_source_key(&self, task_id: Uuid) -> SegmentStoreResult<String>;
}

/// The task-level surface: creation, status transitions, and the terminal
/// output key (§3, §4.9).
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    async fn create(&self, task: &Task) -> SegmentStoreResult<()>;

    async fn get(&self, task_id: Uuid) -> SegmentStoreResult<Option<Task>>;

    async fn set_status(&self, task_id: Uuid, status: TaskStatus) -> SegmentStoreResult<()>;

    async fn set_error(&self, task_id: Uuid, detail: &str) -> SegmentStoreResult<()>;

    async fn set_output_key(&self, task_id: Uuid, key: &str) -> SegmentStoreResult<()>;
}
