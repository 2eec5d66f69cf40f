use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Columns of a task record. Reads name the ones they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Id,
    Title,
    DueDate,
    HideUntil,
    RepeatUntil,
    CompletionDate,
    ModificationDate,
    Recurrence,
}

impl TaskField {
    pub const ALL: [TaskField; 8] = [
        TaskField::Id,
        TaskField::Title,
        TaskField::DueDate,
        TaskField::HideUntil,
        TaskField::RepeatUntil,
        TaskField::CompletionDate,
        TaskField::ModificationDate,
        TaskField::Recurrence,
    ];
}

impl std::fmt::Display for TaskField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskField::Id => write!(f, "id"),
            TaskField::Title => write!(f, "title"),
            TaskField::DueDate => write!(f, "due_date"),
            TaskField::HideUntil => write!(f, "hide_until"),
            TaskField::RepeatUntil => write!(f, "repeat_until"),
            TaskField::CompletionDate => write!(f, "completion_date"),
            TaskField::ModificationDate => write!(f, "modification_date"),
            TaskField::Recurrence => write!(f, "recurrence"),
        }
    }
}

/// A task record. Timestamps are epoch milliseconds and `0` means unset.
///
/// `fields` lists the columns this value actually carries: everything for a
/// full record, only the projected columns for a partial read. Setters add
/// their column so a save writes it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due_date: i64,
    #[serde(default)]
    pub hide_until: i64,
    #[serde(default)]
    pub repeat_until: i64,
    #[serde(default)]
    pub completion_date: i64,
    #[serde(default)]
    pub modification_date: i64,
    #[serde(default)]
    pub recurrence: Option<String>,
    #[serde(skip, default = "all_fields")]
    fields: BTreeSet<TaskField>,
}

fn all_fields() -> BTreeSet<TaskField> {
    TaskField::ALL.into_iter().collect()
}

impl Task {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            due_date: 0,
            hide_until: 0,
            repeat_until: 0,
            completion_date: 0,
            modification_date: 0,
            recurrence: None,
            fields: all_fields(),
        }
    }

    /// Copies only `fields` out of `self`. The id always comes along.
    pub fn project(&self, fields: &[TaskField]) -> Task {
        let mut projected = Task::new(self.id, String::new());
        projected.fields = fields.iter().copied().collect();
        projected.fields.insert(TaskField::Id);

        for field in &projected.fields {
            match field {
                TaskField::Id => {}
                TaskField::Title => projected.title = self.title.clone(),
                TaskField::DueDate => projected.due_date = self.due_date,
                TaskField::HideUntil => projected.hide_until = self.hide_until,
                TaskField::RepeatUntil => projected.repeat_until = self.repeat_until,
                TaskField::CompletionDate => projected.completion_date = self.completion_date,
                TaskField::ModificationDate => {
                    projected.modification_date = self.modification_date
                }
                TaskField::Recurrence => projected.recurrence = self.recurrence.clone(),
            }
        }
        projected
    }

    /// Writes the columns `self` carries onto `target`.
    pub fn merge_into(&self, target: &mut Task) {
        for field in &self.fields {
            match field {
                TaskField::Id => target.id = self.id,
                TaskField::Title => target.title = self.title.clone(),
                TaskField::DueDate => target.due_date = self.due_date,
                TaskField::HideUntil => target.hide_until = self.hide_until,
                TaskField::RepeatUntil => target.repeat_until = self.repeat_until,
                TaskField::CompletionDate => target.completion_date = self.completion_date,
                TaskField::ModificationDate => target.modification_date = self.modification_date,
                TaskField::Recurrence => target.recurrence = self.recurrence.clone(),
            }
        }
    }

    pub fn has_field(&self, field: TaskField) -> bool {
        self.fields.contains(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = TaskField> + '_ {
        self.fields.iter().copied()
    }

    pub fn set_due_date(&mut self, due_date: i64) {
        self.due_date = due_date;
        self.fields.insert(TaskField::DueDate);
    }

    pub fn set_hide_until(&mut self, hide_until: i64) {
        self.hide_until = hide_until;
        self.fields.insert(TaskField::HideUntil);
    }

    pub fn set_completion_date(&mut self, completion_date: i64) {
        self.completion_date = completion_date;
        self.fields.insert(TaskField::CompletionDate);
    }

    pub fn set_modification_date(&mut self, modification_date: i64) {
        self.modification_date = modification_date;
        self.fields.insert(TaskField::ModificationDate);
    }

    /// Moves the due date and keeps hide-until at the same distance from it.
    /// A hide-until with no due date to anchor it, or one that would land
    /// outside the representable range, is cleared.
    pub fn set_due_date_adjusting_hide_until(&mut self, new_due_date: i64) {
        let old_due_date = self.due_date;
        let hide_until = self.hide_until;

        self.set_due_date(new_due_date);
        if hide_until > 0 {
            let adjusted = if old_due_date > 0 && new_due_date > 0 {
                new_due_date
                    .checked_sub(old_due_date)
                    .and_then(|delta| hide_until.checked_add(delta))
                    .filter(|adjusted| *adjusted > 0)
                    .unwrap_or(0)
            } else {
                0
            };
            self.set_hide_until(adjusted);
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completion_date > 0
    }
}
