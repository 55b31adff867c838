//! # Domain Layer
//!
//! Entities the engine routes and caches, and the contract it consumes from
//! the transport.
//!
//! ## Structure
//!
//! - **entities**: users, conversations, messages, reactions and events
//! - **value_objects**: message timestamps and mention tokens
//! - **client**: the `ChatClient` trait implemented by the transport layer
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or application layers
//! - Wire formats stop at the classifier; everything here is normalized

pub mod client;
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use client::{ChatClient, ClientError, DirectorySnapshot, OutgoingMessage, SentMessage};
pub use entities::*;
pub use value_objects::*;
