use crate::error::AppError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fire-and-forget sink for failures the user never sees.
pub trait Tracker: Send + Sync {
    fn report_exception(&self, error: &AppError);
}

/// Forwards reports to the tracing pipeline and keeps a running count.
#[derive(Default)]
pub struct TracingTracker {
    reported: AtomicU64,
}

impl TracingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl Tracker for TracingTracker {
    fn report_exception(&self, error: &AppError) {
        let total = self.reported.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(target: "telemetry", error = %error, total, "Exception reported");
    }
}
