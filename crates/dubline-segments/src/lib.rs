pub mod error;
pub mod postgres;
pub mod traits;

pub use error::{SegmentStoreError, SegmentStoreResult};
pub use postgres::{PgSegmentStore, PgTaskStore};
pub use traits::{BarrierOutcome, SegmentStore, TaskStore};

#[cfg(test)]
mod barrier_tests {
    //! Exercises the fan-in barrier logic against a real Postgres instance
    //! when `DUBLINE_TEST_DATABASE_URL` is set; otherwise skipped, matching
    //! the corpus's convention of gating DB-backed tests behind an env var
    //! rather than mocking the database.
    use super::*;
    use dubline_core::Task;

    async fn test_pool() -> Option<sqlx::PgPool> {
        let url = std::env::var("DUBLINE_TEST_DATABASE_URL").ok()?;
        sqlx::PgPool::connect(&url).await.ok()
    }

    #[tokio::test]
    async fn exactly_one_caller_observes_zero_remaining() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping: DUBLINE_TEST_DATABASE_URL not set");
            return;
        };
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let segments = PgSegmentStore::from_pool(pool.clone());
        let tasks = PgTaskStore::from_pool(pool);

        let task = Task::new("src/a.mp4", "en");
        tasks.create(&task).await.unwrap();

        for idx in 0..4 {
            segments
                .upsert_source(task.id, idx, idx as i64 * 1000, idx as i64 * 1000 + 900, "hola")
                .await
                .unwrap();
            segments
                .set_translation(task.id, idx, "hello")
                .await
                .unwrap();
        }

        let mut zero_observations = 0;
        for idx in 0..4 {
            let outcome = segments
                .set_tts_key_and_count_remaining(task.id, idx, &format!("tts/{}/segment_{idx}.wav", task.id))
                .await
                .unwrap();
            if outcome.fires_barrier() {
                zero_observations += 1;
            }
        }

        assert_eq!(zero_observations, 1);
    }

    /// A re-delivery of an already-processed `task.tts` message must not
    /// re-arm the barrier: the second call against an already-set segment
    /// affects zero rows and is reported as `newly_set: false`, even though
    /// `remaining` is still zero.
    #[tokio::test]
    async fn redelivery_does_not_rearm_barrier() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping: DUBLINE_TEST_DATABASE_URL not set");
            return;
        };
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let segments = PgSegmentStore::from_pool(pool.clone());
        let tasks = PgTaskStore::from_pool(pool);

        let task = Task::new("src/a.mp4", "en");
        tasks.create(&task).await.unwrap();

        segments
            .upsert_source(task.id, 0, 0, 900, "hola")
            .await
            .unwrap();
        segments.set_translation(task.id, 0, "hello").await.unwrap();

        let key = format!("tts/{}/segment_0.wav", task.id);
        let first = segments
            .set_tts_key_and_count_remaining(task.id, 0, &key)
            .await
            .unwrap();
        assert!(first.fires_barrier());

        let redelivered = segments
            .set_tts_key_and_count_remaining(task.id, 0, &key)
            .await
            .unwrap();
        assert_eq!(redelivered.remaining, 0);
        assert!(!redelivered.newly_set);
        assert!(!redelivered.fires_barrier());
    }

    /// S2 from the testable-properties scenarios: two segments' TTS
    /// complete within milliseconds of each other. Drives the last two
    /// `set_tts_key_and_count_remaining` calls concurrently (rather than
    /// sequentially, as above) so the task-row lock is actually contended.
    #[tokio::test]
    async fn concurrent_completions_yield_exactly_one_zero() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping: DUBLINE_TEST_DATABASE_URL not set");
            return;
        };
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let segments = PgSegmentStore::from_pool(pool.clone());
        let tasks = PgTaskStore::from_pool(pool);

        let task = Task::new("src/a.mp4", "en");
        tasks.create(&task).await.unwrap();

        for idx in 0..2 {
            segments
                .upsert_source(task.id, idx, idx as i64 * 1000, idx as i64 * 1000 + 900, "hola")
                .await
                .unwrap();
            segments.set_translation(task.id, idx, "hello").await.unwrap();
        }

        let (r0, r1) = tokio::join!(
            segments.set_tts_key_and_count_remaining(task.id, 0, "tts/t/segment_0.wav"),
            segments.set_tts_key_and_count_remaining(task.id, 1, "tts/t/segment_1.wav"),
        );

        let zero_observations = [r0.unwrap(), r1.unwrap()]
            .iter()
            .filter(|o| o.fires_barrier())
            .count();
        assert_eq!(zero_observations, 1);
    }
}
