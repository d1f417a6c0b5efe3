//! Drives the coarse task-level status field alongside the fine-grained
//! per-stage envelope flow; neither replaces the other.

use dubline_core::{PipelineError, TaskStatus};
use dubline_segments::TaskStore;

pub struct TaskStateMachine<'a> {
    tasks: &'a dyn TaskStore,
}

impl<'a> TaskStateMachine<'a> {
    pub fn new(tasks: &'a dyn TaskStore) -> Self {
        Self { tasks }
    }

    /// Moves `queued` to `processing` on first delivery; a no-op (not an
    /// error) on any later stage, since the task is already processing.
    pub async fn mark_started(&self, task_id: uuid::Uuid) -> Result<(), PipelineError> {
        let Some(task) = self.tasks.get(task_id).await? else {
            return Err(PipelineError::NotFound(format!("task {task_id} not found")));
        };
        if task.status.can_transition_to(TaskStatus::Processing) {
            self.tasks.set_status(task_id, TaskStatus::Processing).await?;
        }
        Ok(())
    }

    /// Records a terminal failure once a handler reports a non-retryable
    /// error; retryable errors leave task status untouched so a later
    /// redelivery can still succeed.
    pub async fn mark_failed(&self, task_id: uuid::Uuid, detail: &str) -> Result<(), PipelineError> {
        self.tasks.set_error(task_id, detail).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dubline_core::Task;
    use dubline_segments::SegmentStoreResult;
    use std::sync::Mutex;

    struct FakeTaskStore {
        task: Mutex<Task>,
    }

    #[async_trait]
    impl TaskStore for FakeTaskStore {
        async fn create(&self, _task: &Task) -> SegmentStoreResult<()> {
            Ok(())
        }
        async fn get(&self, _task_id: uuid::Uuid) -> SegmentStoreResult<Option<Task>> {
            Ok(Some(self.task.lock().unwrap().clone()))
        }
        async fn set_status(&self, _task_id: uuid::Uuid, status: TaskStatus) -> SegmentStoreResult<()> {
            self.task.lock().unwrap().status = status;
            Ok(())
        }
        async fn set_error(&self, _task_id: uuid::Uuid, detail: &str) -> SegmentStoreResult<()> {
            let mut t = self.task.lock().unwrap();
            t.status = TaskStatus::Failed;
            t.error_detail = Some(detail.to_string());
            Ok(())
        }
        async fn set_output_key(&self, _task_id: uuid::Uuid, _key: &str) -> SegmentStoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn mark_started_transitions_queued_to_processing() {
        let store = FakeTaskStore { task: Mutex::new(Task::new("a.mp4", "en")) };
        let machine = TaskStateMachine::new(&store);
        let id = store.task.lock().unwrap().id;
        machine.mark_started(id).await.unwrap();
        assert_eq!(store.task.lock().unwrap().status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn mark_started_is_noop_when_already_processing() {
        let mut task = Task::new("a.mp4", "en");
        task.status = TaskStatus::Processing;
        let store = FakeTaskStore { task: Mutex::new(task) };
        let machine = TaskStateMachine::new(&store);
        let id = store.task.lock().unwrap().id;
        machine.mark_started(id).await.unwrap();
        assert_eq!(store.task.lock().unwrap().status, TaskStatus::Processing);
    }
}
