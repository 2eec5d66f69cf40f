use crate::dates::DateFormatter;
use crate::error::{AppError, Result};
use crate::events::event_types::{Delivery, RescheduleEvent};
use crate::notification::notification_host::DisplaySurface;
use crate::notification::notification_models::{Notification, NotificationAction};
use crate::redelivery::RedeliveryExecutor;
use crate::task::task_models::{Task, TaskField};
use crate::task::task_repository::TaskStore;
use crate::telemetry::Tracker;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const RESCHEDULED_FIELDS: [TaskField; 5] = [
    TaskField::Id,
    TaskField::Title,
    TaskField::DueDate,
    TaskField::HideUntil,
    TaskField::RepeatUntil,
];

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// `{title}` and `{date}` are substituted.
    pub template: String,
    pub undo_label: String,
    pub toast_duration: Duration,
    pub use_24_hour_clock: bool,
    pub utc_offset_minutes: i32,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            template: "{title} rescheduled to {date}".to_string(),
            undo_label: "Undo".to_string(),
            toast_duration: Duration::from_millis(2750),
            use_24_hour_clock: false,
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Ignored,
    Shown(Uuid),
    RedeliveryScheduled { attempt: u32 },
    RedeliveryExhausted,
    /// Logged and reported; the user sees nothing for this event.
    Failed,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct RescheduleNotifier {
    store: Arc<dyn TaskStore>,
    surface: Arc<dyn DisplaySurface>,
    tracker: Arc<dyn Tracker>,
    redelivery: RedeliveryExecutor,
    settings: NotifierSettings,
    clock: Clock,
}

impl RescheduleNotifier {
    pub fn new(
        store: Arc<dyn TaskStore>,
        surface: Arc<dyn DisplaySurface>,
        tracker: Arc<dyn Tracker>,
        redelivery: RedeliveryExecutor,
        settings: NotifierSettings,
    ) -> Self {
        Self {
            store,
            surface,
            tracker,
            redelivery,
            settings,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub async fn run(&self, rx: broadcast::Receiver<Delivery>) {
        let mut stream = BroadcastStream::new(rx);
        while let Some(item) = stream.next().await {
            match item {
                Ok(delivery) => {
                    self.handle(delivery);
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Reschedule notifier lagged behind the event bus");
                }
            }
        }
        info!("Reschedule event bus closed");
    }

    // Never returns an error; the dispatcher must not see one.
    pub fn handle(&self, delivery: Delivery) -> HandleOutcome {
        let event = delivery.event;
        if !event.is_actionable() {
            debug!(task_id = event.task_id, "Ignoring reschedule event without a task");
            return HandleOutcome::Ignored;
        }

        match self.show_rescheduled(&event) {
            Ok(id) => {
                info!(task_id = event.task_id, toast = %id, "Shown reschedule notification");
                HandleOutcome::Shown(id)
            }
            Err(AppError::SurfaceNotAttached) => {
                warn!(
                    task_id = event.task_id,
                    attempt = delivery.attempt,
                    "Display surface not attached"
                );
                self.schedule_redelivery(delivery)
            }
            Err(e) => {
                error!(task_id = event.task_id, error = %e, "Failed to show reschedule notification");
                self.tracker.report_exception(&e);
                HandleOutcome::Failed
            }
        }
    }

    fn schedule_redelivery(&self, delivery: Delivery) -> HandleOutcome {
        let next = delivery.next_attempt();
        if !self.redelivery.policy().allows(next.attempt) {
            warn!(
                task_id = delivery.event.task_id,
                attempts = delivery.attempt,
                "Giving up on reschedule event"
            );
            return HandleOutcome::RedeliveryExhausted;
        }

        match self.redelivery.submit(next) {
            Ok(()) => HandleOutcome::RedeliveryScheduled {
                attempt: next.attempt,
            },
            Err(e) => {
                error!(task_id = delivery.event.task_id, error = %e, "Could not schedule redelivery");
                self.tracker.report_exception(&e);
                HandleOutcome::Failed
            }
        }
    }

    fn show_rescheduled(&self, event: &RescheduleEvent) -> Result<Uuid> {
        let task = self
            .store
            .fetch_by_id(event.task_id, &RESCHEDULED_FIELDS)?
            .ok_or_else(|| AppError::NotFound(format!("Task {}", event.task_id)))?;

        let text = self.notification_text(&task, event.new_due_date)?;

        let store = self.store.clone();
        let tracker = self.tracker.clone();
        let old_due_date = event.old_due_date;
        let undo = NotificationAction::new(self.settings.undo_label.clone(), move || {
            undo_reschedule(store.as_ref(), tracker.as_ref(), task, old_due_date)
        });

        self.surface
            .show(Notification::new(text, self.settings.toast_duration).with_action(undo))
    }

    pub fn notification_text(&self, task: &Task, new_due_date: i64) -> Result<String> {
        let formatter = DateFormatter::new(
            self.settings.utc_offset_minutes,
            self.settings.use_24_hour_clock,
        )?;
        let date = formatter.relative_date_and_time(new_due_date, (self.clock)())?;
        Ok(render_template(
            &self.settings.template,
            &[("title", task.title.as_str()), ("date", date.as_str())],
        ))
    }
}

fn undo_reschedule(store: &dyn TaskStore, tracker: &dyn Tracker, mut task: Task, old_due_date: i64) {
    task.set_due_date_adjusting_hide_until(old_due_date);
    task.set_completion_date(0);

    match store.save(&task) {
        Ok(()) => info!(task_id = task.id, "Reverted reschedule"),
        Err(e) => {
            error!(task_id = task.id, error = %e, "Failed to revert reschedule");
            tracker.report_exception(&e);
        }
    }
}

// Single pass so substituted values are never re-expanded.
fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let substituted = after.find('}').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });

        match substituted {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_bus::EventBus;
    use crate::notification::notification_host::ToastHost;
    use crate::redelivery::RedeliveryPolicy;
    use crate::test_support::{FailingSurface, RecordingStore, RecordingTracker};
    use chrono::TimeZone;

    const HOUR: i64 = 60 * 60 * 1000;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).single().unwrap()
    }

    fn millis(d: u32, h: u32, m: u32) -> i64 {
        Utc.with_ymd_and_hms(2025, 3, d, h, m, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    struct Fixture {
        store: Arc<RecordingStore>,
        host: Arc<ToastHost>,
        tracker: Arc<RecordingTracker>,
        bus: EventBus,
        redelivery: RedeliveryExecutor,
        notifier: RescheduleNotifier,
    }

    fn fixture_with(surface: Option<Arc<dyn DisplaySurface>>, max_attempts: u32) -> Fixture {
        build_fixture(surface, max_attempts, NotifierSettings::default())
    }

    fn build_fixture(
        surface: Option<Arc<dyn DisplaySurface>>,
        max_attempts: u32,
        settings: NotifierSettings,
    ) -> Fixture {
        let mut task = Task::new(42, "Pay rent");
        task.set_due_date(millis(13, 15, 30));
        task.set_hide_until(millis(13, 15, 30) - 24 * HOUR);
        task.set_completion_date(millis(12, 8, 0));
        task.recurrence = Some("FREQ=MONTHLY".to_string());

        let store = Arc::new(RecordingStore::with_tasks([task]));
        let host = Arc::new(ToastHost::new());
        host.attach();
        let tracker = Arc::new(RecordingTracker::default());
        let bus = EventBus::new(16);
        let policy = RedeliveryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(200),
        };
        let redelivery = RedeliveryExecutor::spawn(bus.clone(), policy, 4);
        let surface: Arc<dyn DisplaySurface> = match surface {
            Some(surface) => surface,
            None => host.clone(),
        };

        let notifier = RescheduleNotifier::new(
            store.clone(),
            surface,
            tracker.clone(),
            redelivery.clone(),
            settings,
        )
        .with_clock(fixed_now);

        Fixture {
            store,
            host,
            tracker,
            bus,
            redelivery,
            notifier,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(None, 1)
    }

    fn rescheduled(task_id: i64) -> Delivery {
        Delivery::first(RescheduleEvent::new(
            task_id,
            millis(12, 15, 30),
            millis(13, 15, 30),
        ))
    }

    #[test]
    fn test_render_template_single_pass() {
        assert_eq!(
            render_template("{title} rescheduled to {date}", &[("title", "{date}"), ("date", "Today")]),
            "{date} rescheduled to Today"
        );
        assert_eq!(render_template("{unknown} {", &[("title", "x")]), "{unknown} {");
    }

    #[tokio::test]
    async fn test_non_positive_task_id_is_a_no_op() {
        let f = fixture();

        for id in [0, -1, i64::MIN] {
            assert_eq!(f.notifier.handle(rescheduled(id)), HandleOutcome::Ignored);
        }

        assert_eq!(f.store.fetch_calls(), 0);
        assert!(f.host.current().is_none());
        assert_eq!(f.tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_shows_title_and_relative_date_with_time() {
        let f = fixture();

        let outcome = f.notifier.handle(rescheduled(42));

        assert!(matches!(outcome, HandleOutcome::Shown(_)));
        let toast = f.host.current().unwrap();
        assert_eq!(toast.text, "Pay rent rescheduled to Tomorrow at 3:30 PM");
        assert_eq!(toast.action_label.as_deref(), Some("Undo"));
        assert_eq!(f.store.fetch_calls(), 1);
        assert_eq!(f.store.last_fields(), RESCHEDULED_FIELDS.to_vec());
    }

    #[tokio::test]
    async fn test_date_without_time_has_no_suffix() {
        let f = fixture();
        let event = RescheduleEvent::new(42, millis(12, 0, 0), millis(16, 0, 0));

        f.notifier.handle(Delivery::first(event));

        assert_eq!(f.host.current().unwrap().text, "Pay rent rescheduled to Sunday");
    }

    #[tokio::test]
    async fn test_undo_restores_due_date_and_clears_completion() {
        let f = fixture();
        let before = f.store.inner().get(42).unwrap();

        f.notifier.handle(rescheduled(42));
        assert!(f.host.invoke_action());

        let after = f.store.inner().get(42).unwrap();
        assert_eq!(f.store.save_calls(), 1);
        assert_eq!(after.due_date, millis(12, 15, 30));
        assert_eq!(after.hide_until, before.hide_until - 24 * HOUR);
        assert_eq!(after.completion_date, 0);
        assert_eq!(after.title, "Pay rent");
        assert_eq!(after.recurrence.as_deref(), Some("FREQ=MONTHLY"));
    }

    #[tokio::test]
    async fn test_dismiss_does_not_save() {
        let f = fixture();
        f.notifier.handle(rescheduled(42));
        assert!(f.host.dismiss());
        assert_eq!(f.store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_task_is_reported_not_shown() {
        let f = fixture();

        assert_eq!(f.notifier.handle(rescheduled(7)), HandleOutcome::Failed);

        assert!(f.host.current().is_none());
        assert_eq!(f.tracker.count(), 1);
        assert!(f.tracker.messages()[0].contains("Task 7"));
    }

    #[tokio::test]
    async fn test_display_failure_is_reported_and_swallowed() {
        let f = fixture_with(Some(Arc::new(FailingSurface)), 1);

        assert_eq!(f.notifier.handle(rescheduled(42)), HandleOutcome::Failed);

        assert_eq!(f.tracker.count(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_and_swallowed() {
        let f = fixture();
        f.store.fail_fetches(true);

        assert_eq!(f.notifier.handle(rescheduled(42)), HandleOutcome::Failed);
        assert_eq!(f.tracker.count(), 1);
        assert!(f.host.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_surface_redelivers_identical_event_once() {
        let f = fixture();
        f.host.detach();
        let mut rx = f.bus.subscribe();
        let first = rescheduled(42);

        assert_eq!(
            f.notifier.handle(first),
            HandleOutcome::RedeliveryScheduled { attempt: 1 }
        );
        assert_eq!(f.tracker.count(), 0);

        let redelivered = rx.recv().await.unwrap();
        assert_eq!(redelivered.event, first.event);
        assert_eq!(redelivered.attempt, 1);

        // Still detached: the limit stops a second redelivery.
        assert_eq!(
            f.notifier.handle(redelivered),
            HandleOutcome::RedeliveryExhausted
        );
        assert_eq!(f.tracker.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redelivered_event_shows_once_surface_returns() {
        let f = fixture();
        f.host.detach();
        let mut rx = f.bus.subscribe();

        f.notifier.handle(rescheduled(42));
        f.host.attach();

        let redelivered = rx.recv().await.unwrap();
        assert!(matches!(f.notifier.handle(redelivered), HandleOutcome::Shown(_)));
        assert_eq!(
            f.host.current().unwrap().text,
            "Pay rent rescheduled to Tomorrow at 3:30 PM"
        );
    }

    #[tokio::test]
    async fn test_out_of_range_due_date_fails_without_panic() {
        let settings = NotifierSettings {
            utc_offset_minutes: 60,
            ..NotifierSettings::default()
        };
        let f = build_fixture(None, 1, settings);
        let far_future = DateTime::<Utc>::MAX_UTC.timestamp_millis();

        let outcome = f
            .notifier
            .handle(Delivery::first(RescheduleEvent::new(42, 1, far_future)));

        assert_eq!(outcome, HandleOutcome::Failed);
        assert_eq!(f.tracker.count(), 1);
        assert!(f.host.current().is_none());
    }

    #[tokio::test]
    async fn test_undo_with_extreme_old_due_date_does_not_panic() {
        let f = fixture();
        let mut task = Task::new(43, "Renew passport");
        task.set_due_date(1_000_000);
        task.set_hide_until(2_000_000);
        f.store.inner().insert(task);

        f.notifier.handle(Delivery::first(RescheduleEvent::new(
            43,
            i64::MAX,
            millis(13, 15, 30),
        )));
        assert!(f.host.invoke_action());

        let saved = f.store.inner().get(43).unwrap();
        assert_eq!(saved.due_date, i64::MAX);
        assert_eq!(saved.hide_until, 0);
        assert_eq!(f.store.save_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redelivery_submit_failure_is_reported() {
        let f = fixture();
        f.redelivery.shutdown().await;
        f.host.detach();

        assert_eq!(f.notifier.handle(rescheduled(42)), HandleOutcome::Failed);

        assert_eq!(f.tracker.count(), 1);
        assert!(f.tracker.messages()[0].contains("shut down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_redeliveries_means_drop() {
        let f = fixture_with(None, 0);
        f.host.detach();
        assert_eq!(
            f.notifier.handle(rescheduled(42)),
            HandleOutcome::RedeliveryExhausted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_handles_bus_events() {
        let f = fixture();
        let rx = f.bus.subscribe();
        let notifier = Arc::new(f.notifier);
        let runner = {
            let notifier = notifier.clone();
            tokio::spawn(async move { notifier.run(rx).await })
        };

        f.bus.publish(rescheduled(42).event);
        for _ in 0..10 {
            if f.host.current().is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(
            f.host.current().unwrap().text,
            "Pay rent rescheduled to Tomorrow at 3:30 PM"
        );
        runner.abort();
    }
}
