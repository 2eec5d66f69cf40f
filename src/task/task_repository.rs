use crate::error::{AppError, Result};
use crate::task::task_models::{Task, TaskField};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// Read one record, write one record. Calls block the caller.
pub trait TaskStore: Send + Sync {
    fn fetch_by_id(&self, id: i64, fields: &[TaskField]) -> Result<Option<Task>>;

    fn save(&self, task: &Task) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<DashMap<i64, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let repo = Self::new();
        for task in tasks {
            repo.insert(task);
        }
        repo
    }

    /// Replaces the whole record, bypassing partial-write merging.
    pub fn insert(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn get(&self, id: i64) -> Option<Task> {
        self.tasks.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskStore for InMemoryTaskRepository {
    fn fetch_by_id(&self, id: i64, fields: &[TaskField]) -> Result<Option<Task>> {
        Ok(self.tasks.get(&id).map(|entry| entry.value().project(fields)))
    }

    fn save(&self, task: &Task) -> Result<()> {
        if task.id <= 0 {
            return Err(AppError::Store(format!("Cannot save task with id {}", task.id)));
        }

        let now = Utc::now().timestamp_millis();
        let mut entry = self
            .tasks
            .entry(task.id)
            .or_insert_with(|| Task::new(task.id, String::new()));
        task.merge_into(entry.value_mut());
        entry.value_mut().set_modification_date(now);

        tracing::debug!(
            task_id = task.id,
            fields = ?task.fields().collect::<Vec<_>>(),
            "Saved task"
        );
        Ok(())
    }
}
