pub mod dates;
pub mod error;
pub mod events;
pub mod notification;
pub mod redelivery;
pub mod state;
pub mod task;
pub mod telemetry;

#[cfg(test)]
mod test_support;
