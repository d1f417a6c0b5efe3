use crate::error::{SegmentStoreError, SegmentStoreResult};
use crate::traits::{BarrierOutcome, SegmentStore, TaskStore};
use async_trait::async_trait;
use dubline_core::{Segment, Task, TaskStatus};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgSegmentStore {
    pool: PgPool,
}

impl PgSegmentStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> SegmentStoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_segment_row(row: &sqlx::postgres::PgRow) -> Result<Segment, sqlx::Error> {
    Ok(Segment {
        task_id: row.try_get("task_id")?,
        idx: row.try_get("idx")?,
        start_ms: row.try_get("start_ms")?,
        end_ms: row.try_get("end_ms")?,
        source_text: row.try_get("source_text")?,
        translated_text: row.try_get("translated_text")?,
        tts_audio_key: row.try_get("tts_audio_key")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl SegmentStore for PgSegmentStore {
    async fn upsert_source(
        &self,
        task_id: Uuid,
        idx: i32,
        start_ms: i64,
        end_ms: i64,
        text: &str,
    ) -> SegmentStoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO segments (task_id, idx, start_ms, end_ms, source_text, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            ON CONFLICT (task_id, idx) DO UPDATE SET
                start_ms = EXCLUDED.start_ms,
                end_ms = EXCLUDED.end_ms,
                source_text = EXCLUDED.source_text,
                updated_at = now()
            "#,
        )
        .bind(task_id)
        .bind(idx)
        .bind(start_ms)
        .bind(end_ms)
        .bind(text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_translation(&self, task_id: Uuid, idx: i32, text: &str) -> SegmentStoreResult<()> {
        sqlx::query(
            r#"
            UPDATE segments SET translated_text = $1, updated_at = now()
            WHERE task_id = $2 AND idx = $3
            "#,
        )
        .bind(text)
        .bind(task_id)
        .bind(idx)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_tts_key_and_count_remaining(
        &self,
        task_id: Uuid,
        idx: i32,
        key: &str,
    ) -> SegmentStoreResult<BarrierOutcome> {
        let mut tx = self.pool.begin().await?;

        // Lock the task row first so concurrent completions for the same
        // task serialize here rather than racing under READ COMMITTED:
        // without this, two segments' UPDATE+COUNT can each run against a
        // snapshot that doesn't yet see the other's (uncommitted) write,
        // so both observe a nonzero count and neither fires mux (§4.3, §9).
        sqlx::query(r#"SELECT id FROM tasks WHERE id = $1 FOR UPDATE"#)
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| SegmentStoreError::TaskNotFound(task_id.to_string()))?;

        // Conditioned on the key still being unset: a re-delivery of an
        // already-processed `task.tts` message finds the key already
        // present, affects zero rows, and must not re-arm the barrier
        // (§8 invariant 5).
        let update_result = sqlx::query(
            r#"
            UPDATE segments SET tts_audio_key = $1, updated_at = now()
            WHERE task_id = $2 AND idx = $3 AND tts_audio_key IS NULL
            "#,
        )
        .bind(key)
        .bind(task_id)
        .bind(idx)
        .execute(&mut *tx)
        .await?;
        let newly_set = update_result.rows_affected() == 1;

        // With the task row locked for the duration of this transaction,
        // this read-after-write is linearizable with respect to every other
        // set_tts_key_and_count_remaining call for this task: exactly one
        // caller observes zero.
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS remaining FROM segments
            WHERE task_id = $1 AND tts_audio_key IS NULL
            "#,
        )
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;
        let remaining: i64 = row.try_get("remaining")?;

        tx.commit().await?;
        Ok(BarrierOutcome { remaining, newly_set })
    }

    async fn list_source(&self, task_id: Uuid) -> SegmentStoreResult<Vec<Segment>> {
        let rows = sqlx::query(
            r#"SELECT * FROM segments WHERE task_id = $1 ORDER BY idx ASC"#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(parse_segment_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SegmentStoreError::from)
    }

    async fn count_missing_tts(&self, task_id: Uuid) -> SegmentStoreResult<i64> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS remaining FROM segments WHERE task_id = $1 AND tts_audio_key IS NULL"#,
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("remaining")?)
    }

    async fn get_source_key(&self, task_id: Uuid) -> SegmentStoreResult<String> {
        let row = sqlx::query(r#"SELECT source_video_key FROM tasks WHERE id = $1"#)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SegmentStoreError::TaskNotFound(task_id.to_string()))?;
        Ok(row.try_get("source_video_key")?)
    }
}

fn parse_task_row(row: &sqlx::postgres::PgRow) -> Result<Task, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = status_str.parse::<TaskStatus>().map_err(|e| {
        sqlx::Error::Decode(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        )))
    })?;
    Ok(Task {
        id: row.try_get("id")?,
        source_video_key: row.try_get("source_video_key")?,
        target_language: row.try_get("target_language")?,
        status,
        output_video_key: row.try_get("output_video_key")?,
        error_detail: row.try_get("error_detail")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, task: &Task) -> SegmentStoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, source_video_key, target_language, status, output_video_key, error_detail, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(task.id)
        .bind(&task.source_video_key)
        .bind(&task.target_language)
        .bind(task.status.as_str())
        .bind(&task.output_video_key)
        .bind(&task.error_detail)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> SegmentStoreResult<Option<Task>> {
        let row = sqlx::query(r#"SELECT * FROM tasks WHERE id = $1"#)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(parse_task_row)
            .transpose()
            .map_err(SegmentStoreError::from)
    }

    async fn set_status(&self, task_id: Uuid, status: TaskStatus) -> SegmentStoreResult<()> {
        sqlx::query(r#"UPDATE tasks SET status = $1, updated_at = now() WHERE id = $2"#)
            .bind(status.as_str())
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_error(&self, task_id: Uuid, detail: &str) -> SegmentStoreResult<()> {
        sqlx::query(
            r#"UPDATE tasks SET status = 'failed', error_detail = $1, updated_at = now() WHERE id = $2"#,
        )
        .bind(detail)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_output_key(&self, task_id: Uuid, key: &str) -> SegmentStoreResult<()> {
        sqlx::query(r#"UPDATE tasks SET output_video_key = $1, updated_at = now() WHERE id = $2"#)
            .bind(key)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
