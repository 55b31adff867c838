//! # Domain Entities
//!
//! Core objects the engine routes and caches.
//!
//! ## Directory
//!
//! - **User**: a workspace member, plus the bot's own `SelfIdentity`
//! - **Channel**: one unified entry for channels, groups and direct conversations
//!
//! ## Stream
//!
//! - **Event**: the classified form of every raw frame
//! - **Message**: the enriched projection listeners see
//! - **ReactionEvent**: emoji reactions, and the targets overlays bind to

mod channel;
mod event;
mod message;
mod reaction;
mod user;

pub use channel::{Channel, ConversationKind, Topic};
pub use event::{DirectoryChange, EditedMessage, Event, MessageEvent};
pub use message::Message;
pub use reaction::{ReactionEvent, ReactionItem, ReactionKind, ReactionTarget};
pub use user::{Presence, SelfIdentity, User, UserProfile};
