use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Storage failures. Callers treat these as transient and may retry.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Message broker error: {0}")]
    Broker(String),

    #[error("Notification delivery error: {0}")]
    NotificationDelivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
