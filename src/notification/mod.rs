pub mod notification_host;
pub mod notification_models;
pub mod notification_service;

pub use notification_host::{DisplaySurface, ToastHost};
pub use notification_service::{HandleOutcome, NotifierSettings, RescheduleNotifier};
