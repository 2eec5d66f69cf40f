use crate::error::{AppError, Result};
use crate::notification::notification_models::{
    Notification, NotificationAction, ToastClosed, ToastEvent, VisibleToast,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Somewhere a transient notification can be shown.
pub trait DisplaySurface: Send + Sync {
    /// Fails with `AppError::SurfaceNotAttached` when the surface has been
    /// torn down.
    fn show(&self, notification: Notification) -> Result<Uuid>;
}

struct ActiveToast {
    id: Uuid,
    text: String,
    action: Option<NotificationAction>,
}

impl ActiveToast {
    fn visible(&self) -> VisibleToast {
        VisibleToast {
            id: self.id,
            text: self.text.clone(),
            action_label: self.action.as_ref().map(|a| a.label.clone()),
        }
    }
}

// Attachment and the visible toast change under one lock so a toast can
// never be installed on a detached host.
#[derive(Default)]
struct HostState {
    attached: bool,
    current: Option<ActiveToast>,
}

/// Shows one toast at a time. A new toast replaces the visible one and each
/// toast expires after its own duration.
pub struct ToastHost {
    state: Arc<Mutex<HostState>>,
    events: broadcast::Sender<ToastEvent>,
}

impl Default for ToastHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastHost {
    /// Starts detached.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(HostState::default())),
            events,
        }
    }

    pub fn attach(&self) {
        lock(&self.state).attached = true;
        tracing::debug!("Toast host attached");
    }

    /// Hides whatever is visible. Its action is dropped without running.
    pub fn detach(&self) {
        let closed = {
            let mut state = lock(&self.state);
            state.attached = false;
            state.current.take()
        };
        if let Some(toast) = closed {
            emit(&self.events, ToastEvent::Closed {
                id: toast.id,
                reason: ToastClosed::Detached,
            });
        }
        tracing::debug!("Toast host detached");
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.state).attached
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.events.subscribe()
    }

    pub fn current(&self) -> Option<VisibleToast> {
        lock(&self.state).current.as_ref().map(ActiveToast::visible)
    }

    /// Runs the visible toast's action and closes it. Returns false when
    /// nothing with an action was on screen.
    pub fn invoke_action(&self) -> bool {
        let taken = {
            let mut state = lock(&self.state);
            let actionable =
                matches!(state.current.as_ref(), Some(toast) if toast.action.is_some());
            if actionable {
                state.current.take()
            } else {
                None
            }
        };

        let Some(toast) = taken else {
            return false;
        };
        emit(&self.events, ToastEvent::Closed {
            id: toast.id,
            reason: ToastClosed::ActionInvoked,
        });
        if let Some(action) = toast.action {
            action.invoke();
        }
        true
    }

    pub fn dismiss(&self) -> bool {
        let closed = lock(&self.state).current.take();
        match closed {
            Some(toast) => {
                emit(&self.events, ToastEvent::Closed {
                    id: toast.id,
                    reason: ToastClosed::Dismissed,
                });
                true
            }
            None => false,
        }
    }
}

impl DisplaySurface for ToastHost {
    fn show(&self, notification: Notification) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let action_label = notification.action_label().map(str::to_string);
        let duration = notification.duration;
        let toast = ActiveToast {
            id,
            text: notification.text.clone(),
            action: notification.action,
        };

        let replaced = {
            let mut state = lock(&self.state);
            if !state.attached {
                return Err(AppError::SurfaceNotAttached);
            }
            state.current.replace(toast)
        };
        if let Some(old) = replaced {
            emit(&self.events, ToastEvent::Closed {
                id: old.id,
                reason: ToastClosed::Replaced,
            });
        }
        emit(&self.events, ToastEvent::Shown {
            id,
            text: notification.text,
            action_label,
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = self.state.clone();
                let events = self.events.clone();
                handle.spawn(async move {
                    tokio::time::sleep(duration).await;
                    let expired = {
                        let mut state = lock(&shared);
                        let still_visible =
                            matches!(state.current.as_ref(), Some(toast) if toast.id == id);
                        if still_visible {
                            state.current.take()
                        } else {
                            None
                        }
                    };
                    if expired.is_some() {
                        emit(&events, ToastEvent::Closed {
                            id,
                            reason: ToastClosed::TimedOut,
                        });
                    }
                });
            }
            Err(_) => tracing::debug!(%id, "No runtime; toast will not expire on its own"),
        }

        Ok(id)
    }
}

fn lock(state: &Mutex<HostState>) -> MutexGuard<'_, HostState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn emit(events: &broadcast::Sender<ToastEvent>, event: ToastEvent) {
    let _ = events.send(event);
}
