use crate::error::{AppError, Result};
use crate::events::event_bus::EventBus;
use crate::events::event_types::Delivery;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Redeliveries allowed after the first delivery.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RedeliveryPolicy {
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// One worker re-emits deliveries after a backoff. The queue is bounded.
#[derive(Clone)]
pub struct RedeliveryExecutor {
    policy: RedeliveryPolicy,
    tx: mpsc::Sender<Delivery>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RedeliveryExecutor {
    pub fn spawn(bus: EventBus, policy: RedeliveryPolicy, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(bus, policy, rx));

        Self {
            policy,
            tx,
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    pub fn policy(&self) -> &RedeliveryPolicy {
        &self.policy
    }

    pub fn submit(&self, delivery: Delivery) -> Result<()> {
        self.tx.try_send(delivery).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::RedeliveryQueueFull,
            mpsc::error::TrySendError::Closed(_) => AppError::RedeliveryClosed,
        })
    }

    pub async fn shutdown(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            info!("Redelivery executor stopped");
        }
    }
}

async fn run_worker(bus: EventBus, policy: RedeliveryPolicy, mut rx: mpsc::Receiver<Delivery>) {
    while let Some(delivery) = rx.recv().await {
        let delay = policy.backoff_for(delivery.attempt);
        debug!(
            task_id = delivery.event.task_id,
            attempt = delivery.attempt,
            delay_ms = delay.as_millis() as u64,
            "Redelivering reschedule event"
        );
        tokio::time::sleep(delay).await;

        if bus.redeliver(delivery) == 0 {
            warn!(
                task_id = delivery.event.task_id,
                "Redelivered event had no subscribers"
            );
        }
    }
}
