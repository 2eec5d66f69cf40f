use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Display surface is not attached")]
    SurfaceNotAttached,

    #[error("Display error: {0}")]
    Display(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Redelivery queue is full")]
    RedeliveryQueueFull,

    #[error("Redelivery executor has shut down")]
    RedeliveryClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Surface detachment is the one failure that warrants another delivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::SurfaceNotAttached)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
