use crate::error::{AppError, Result};
use crate::events::event_bus::EventBus;
use crate::notification::notification_host::ToastHost;
use crate::notification::notification_service::{NotifierSettings, RescheduleNotifier};
use crate::redelivery::{RedeliveryExecutor, RedeliveryPolicy};
use crate::task::task_repository::InMemoryTaskRepository;
use crate::telemetry::TracingTracker;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub bus: EventBus,
    pub task_repository: Arc<InMemoryTaskRepository>,
    pub toast_host: Arc<ToastHost>,
    pub tracker: Arc<TracingTracker>,
    pub redelivery: RedeliveryExecutor,
    pub notifier: Arc<RescheduleNotifier>,
}

impl AppState {
    /// Wires every component together. Must be called inside a tokio runtime.
    pub fn build(config: Config, task_repository: InMemoryTaskRepository) -> Self {
        let config = Arc::new(config);
        let bus = EventBus::new(config.bus_capacity);
        let task_repository = Arc::new(task_repository);
        let toast_host = Arc::new(ToastHost::new());
        toast_host.attach();
        let tracker = Arc::new(TracingTracker::new());
        let redelivery = RedeliveryExecutor::spawn(
            bus.clone(),
            config.redelivery_policy(),
            config.queue_capacity,
        );

        let notifier = Arc::new(RescheduleNotifier::new(
            task_repository.clone(),
            toast_host.clone(),
            tracker.clone(),
            redelivery.clone(),
            config.notifier_settings(),
        ));

        Self {
            config,
            bus,
            task_repository,
            toast_host,
            tracker,
            redelivery,
            notifier,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub template: String,
    pub undo_label: String,
    pub toast_duration_ms: u64,
    pub use_24_hour_clock: bool,
    pub utc_offset_minutes: i32,
    pub max_redeliveries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub bus_capacity: usize,
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template: "{title} rescheduled to {date}".to_string(),
            undo_label: "Undo".to_string(),
            toast_duration_ms: 2750,
            use_24_hour_clock: false,
            utc_offset_minutes: 0,
            max_redeliveries: 1,
            backoff_ms: 250,
            max_backoff_ms: 5000,
            bus_capacity: 100,
            queue_capacity: 16,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup, falling back to defaults for
    /// missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            template: lookup("RESCHEDULE_TEMPLATE").unwrap_or(defaults.template),
            undo_label: lookup("RESCHEDULE_UNDO_LABEL").unwrap_or(defaults.undo_label),
            toast_duration_ms: parse_var(&lookup, "RESCHEDULE_TOAST_MS", defaults.toast_duration_ms)?,
            use_24_hour_clock: parse_var(&lookup, "RESCHEDULE_USE_24H", defaults.use_24_hour_clock)?,
            utc_offset_minutes: parse_var(
                &lookup,
                "RESCHEDULE_UTC_OFFSET_MINUTES",
                defaults.utc_offset_minutes,
            )?,
            max_redeliveries: parse_var(
                &lookup,
                "RESCHEDULE_MAX_REDELIVERIES",
                defaults.max_redeliveries,
            )?,
            backoff_ms: parse_var(&lookup, "RESCHEDULE_BACKOFF_MS", defaults.backoff_ms)?,
            max_backoff_ms: parse_var(&lookup, "RESCHEDULE_MAX_BACKOFF_MS", defaults.max_backoff_ms)?,
            bus_capacity: parse_var(&lookup, "RESCHEDULE_BUS_CAPACITY", defaults.bus_capacity)?,
            queue_capacity: parse_var(&lookup, "RESCHEDULE_QUEUE_CAPACITY", defaults.queue_capacity)?,
        })
    }

    pub fn redelivery_policy(&self) -> RedeliveryPolicy {
        RedeliveryPolicy {
            max_attempts: self.max_redeliveries,
            base_backoff: Duration::from_millis(self.backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn notifier_settings(&self) -> NotifierSettings {
        NotifierSettings {
            template: self.template.clone(),
            undo_label: self.undo_label.clone(),
            toast_duration: Duration::from_millis(self.toast_duration_ms),
            use_24_hour_clock: self.use_24_hour_clock,
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
