use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const EXTRAS_TASK_ID: &str = "task_id";
pub const EXTRAS_OLD_DUE_DATE: &str = "old_due_date";
pub const EXTRAS_NEW_DUE_DATE: &str = "new_due_date";

/// Emitted by the recurrence engine after it moved a task's due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleEvent {
    #[serde(default)]
    pub task_id: i64,
    #[serde(default)]
    pub old_due_date: i64,
    #[serde(default)]
    pub new_due_date: i64,
}

impl RescheduleEvent {
    pub fn new(task_id: i64, old_due_date: i64, new_due_date: i64) -> Self {
        Self {
            task_id,
            old_due_date,
            new_due_date,
        }
    }

    /// Reads the raw extras of an event envelope. Missing keys read as `0`.
    pub fn from_extras(extras: &HashMap<String, i64>) -> Self {
        let get = |key: &str| extras.get(key).copied().unwrap_or(0);
        Self {
            task_id: get(EXTRAS_TASK_ID),
            old_due_date: get(EXTRAS_OLD_DUE_DATE),
            new_due_date: get(EXTRAS_NEW_DUE_DATE),
        }
    }

    pub fn to_extras(&self) -> HashMap<String, i64> {
        HashMap::from([
            (EXTRAS_TASK_ID.to_string(), self.task_id),
            (EXTRAS_OLD_DUE_DATE.to_string(), self.old_due_date),
            (EXTRAS_NEW_DUE_DATE.to_string(), self.new_due_date),
        ])
    }

    /// Events for unsaved or unknown tasks carry a non-positive id.
    pub fn is_actionable(&self) -> bool {
        self.task_id > 0
    }
}

/// One delivery of an event. `attempt` is 0 for the first delivery and
/// counts redeliveries after that; the event itself never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub event: RescheduleEvent,
    pub attempt: u32,
}

impl Delivery {
    pub fn first(event: RescheduleEvent) -> Self {
        Self { event, attempt: 0 }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            event: self.event,
            attempt: self.attempt + 1,
        }
    }
}
