//! Infrastructure Layer
//!
//! Contains the stateful plumbing behind the engine:
//! - Directory cache (users and conversations)
//! - Outgoing reply channel (bounded queue + paced sender)
//! - Prometheus metrics
//! - A line-oriented console transport

pub mod cache;
pub mod console;
pub mod metrics;
pub mod outbox;
