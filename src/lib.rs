//! # ChatOps Bot Library
//!
//! This crate provides the engine of a chat-operations bot:
//! - A single-consumer dispatcher over the real-time event stream
//! - Listeners with a Pending/Active/Closing/Removed lifecycle, including
//!   managed listeners with their own deadline
//! - Reaction overlays bound to one message or file
//! - A concurrency-safe mirror of the workspace directory
//! - A bounded, paced outgoing reply channel
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, value objects and the `ChatClient` transport trait
//! - **Application Layer**: Listeners, registry, dispatcher and the `Bot` context
//! - **Infrastructure Layer**: Directory cache, outbox, metrics, console transport
//!
//! ## Module Structure
//!
//! ```text
//! chatops_bot/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects, transport trait
//! +-- application/    Engine: listeners, registry, dispatcher, plugins
//! +-- infrastructure/ Directory cache, outbox, metrics, console
//! +-- shared/         Common utilities (errors, retry, scheduling)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core entities
pub mod domain;

// Application layer - The engine
pub mod application;

// Infrastructure layer - Stateful plumbing
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Application startup
pub mod startup;

// Telemetry and observability
pub mod telemetry;
