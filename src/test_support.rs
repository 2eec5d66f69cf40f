use crate::error::{AppError, Result};
use crate::notification::notification_host::DisplaySurface;
use crate::notification::notification_models::Notification;
use crate::task::task_models::{Task, TaskField};
use crate::task::task_repository::{InMemoryTaskRepository, TaskStore};
use crate::telemetry::Tracker;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory store that counts calls and can be told to fail reads.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryTaskRepository,
    fetches: AtomicUsize,
    saves: AtomicUsize,
    last_fields: Mutex<Vec<TaskField>>,
    fail_fetches: AtomicBool,
}

impl RecordingStore {
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            inner: InMemoryTaskRepository::from_tasks(tasks),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryTaskRepository {
        &self.inner
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last_fields(&self) -> Vec<TaskField> {
        self.last_fields.lock().unwrap().clone()
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }
}

impl TaskStore for RecordingStore {
    fn fetch_by_id(&self, id: i64, fields: &[TaskField]) -> Result<Option<Task>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_fields.lock().unwrap() = fields.to_vec();
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(AppError::Store("connection lost".into()));
        }
        self.inner.fetch_by_id(id, fields)
    }

    fn save(&self, task: &Task) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(task)
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    reports: Mutex<Vec<String>>,
}

impl RecordingTracker {
    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

impl Tracker for RecordingTracker {
    fn report_exception(&self, error: &AppError) {
        self.reports.lock().unwrap().push(error.to_string());
    }
}

/// A surface that is attached but cannot render anything.
pub struct FailingSurface;

impl DisplaySurface for FailingSurface {
    fn show(&self, _notification: Notification) -> Result<Uuid> {
        Err(AppError::Display("renderer crashed".into()))
    }
}
