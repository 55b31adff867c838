//! Shared Utilities
//!
//! Common utilities used across all layers.

pub mod error;
pub mod retry;
pub mod schedule;
pub mod validation;

pub use error::BotError;
pub use retry::RetryPolicy;
