use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

pub type ActionCallback = Box<dyn FnOnce() + Send + 'static>;

/// The one labelled button a toast may carry. Runs at most once.
pub struct NotificationAction {
    pub label: String,
    callback: ActionCallback,
}

impl NotificationAction {
    pub fn new(label: impl Into<String>, callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            callback: Box::new(callback),
        }
    }

    pub fn invoke(self) {
        (self.callback)()
    }
}

impl std::fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Notification {
    pub text: String,
    pub action: Option<NotificationAction>,
    pub duration: Duration,
}

impl Notification {
    pub fn new(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            text: text.into(),
            action: None,
            duration,
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn action_label(&self) -> Option<&str> {
        self.action.as_ref().map(|a| a.label.as_str())
    }
}

/// Why a toast left the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastClosed {
    ActionInvoked,
    Dismissed,
    TimedOut,
    Replaced,
    Detached,
}

impl std::fmt::Display for ToastClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToastClosed::ActionInvoked => write!(f, "ActionInvoked"),
            ToastClosed::Dismissed => write!(f, "Dismissed"),
            ToastClosed::TimedOut => write!(f, "TimedOut"),
            ToastClosed::Replaced => write!(f, "Replaced"),
            ToastClosed::Detached => write!(f, "Detached"),
        }
    }
}

/// Lifecycle events for observers of a toast host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToastEvent {
    Shown {
        id: Uuid,
        text: String,
        action_label: Option<String>,
    },
    Closed {
        id: Uuid,
        reason: ToastClosed,
    },
}

/// What is on screen right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleToast {
    pub id: Uuid,
    pub text: String,
    pub action_label: Option<String>,
}
