//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **MessageTs**: remote per-channel message timestamp
//! - **Mention**: `<@USER>` tokens embedded in message text

pub mod mention;
mod timestamp;

pub use mention::{mention_token, mentions, mentions_user, Mention};
pub use timestamp::*;
