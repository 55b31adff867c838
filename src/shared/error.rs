//! Bot Error Types
//!
//! Centralized error handling for the engine and its public operations.

use crate::domain::ClientError;

/// Bot error type
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Invalid listener: {0}")]
    InvalidListener(String),

    #[error("Managed listener capacity reached ({0})")]
    ListenerCapacity(usize),

    #[error("Outgoing queue full")]
    QueueFull,

    #[error("Outgoing queue closed")]
    QueueClosed,

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Timed out waiting for delivery")]
    DeliveryTimeout,

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Short, stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::InvalidListener(_) => "invalid_listener",
            BotError::ListenerCapacity(_) => "listener_capacity",
            BotError::QueueFull => "queue_full",
            BotError::QueueClosed => "queue_closed",
            BotError::ChannelNotFound(_) => "channel_not_found",
            BotError::UserNotFound(_) => "user_not_found",
            BotError::DeliveryFailed(_) => "delivery_failed",
            BotError::DeliveryTimeout => "delivery_timeout",
            BotError::Client(_) => "client",
            BotError::Config(_) => "config",
            BotError::Validation(_) => "validation",
            BotError::Plugin(_) => "plugin",
            BotError::Io(_) => "io",
        }
    }
}
