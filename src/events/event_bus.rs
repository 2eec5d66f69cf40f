use crate::events::event_types::{Delivery, RescheduleEvent};
use tokio::sync::broadcast;

/// Typed broadcast channel that carries reschedule deliveries to subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Delivery>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.tx.subscribe()
    }

    /// First delivery of a freshly emitted event. Returns the number of
    /// subscribers that received it.
    pub fn publish(&self, event: RescheduleEvent) -> usize {
        self.send(Delivery::first(event))
    }

    pub fn redeliver(&self, delivery: Delivery) -> usize {
        self.send(delivery)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn send(&self, delivery: Delivery) -> usize {
        match self.tx.send(delivery) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(
                    task_id = delivery.event.task_id,
                    attempt = delivery.attempt,
                    "No subscribers for reschedule event"
                );
                0
            }
        }
    }
}
