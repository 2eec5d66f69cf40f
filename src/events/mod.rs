pub mod event_bus;
pub mod event_types;

pub use event_bus::EventBus;
pub use event_types::{Delivery, RescheduleEvent};
