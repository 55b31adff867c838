//! Normalized events.
//!
//! Every raw frame received from the event source is classified into exactly
//! one [`Event`]. Events are immutable once produced.

use serde::{Deserialize, Serialize};

use super::{Channel, ConversationKind, Presence, ReactionEvent, User};
use crate::domain::value_objects::MessageTs;

/// The message carried by a `message_changed` edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EditedMessage {
    pub user: String,
    pub text: String,
    pub ts: MessageTs,
}

/// Fields of a raw message event, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MessageEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: MessageTs,
    pub thread_ts: Option<MessageTs>,
    pub subtype: Option<String>,

    /// Present for `message_changed` edits
    pub edited: Option<EditedMessage>,

    /// Present for `channel_topic` / `group_topic` subtypes
    pub topic: Option<String>,

    /// Present for `channel_purpose` / `group_purpose` subtypes
    pub purpose: Option<String>,
}

impl MessageEvent {
    pub fn is_edit(&self) -> bool {
        self.edited.is_some()
    }
}

/// A targeted change to one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryChange {
    Created(Channel),
    Joined(Channel),
    Renamed { id: String, name: String },
    Deleted { id: String },
    Archived { id: String },
    Unarchived { id: String },
    Opened { id: String, user: String },
    Closed { id: String },
}

impl DirectoryChange {
    /// ID of the affected entry.
    pub fn id(&self) -> &str {
        match self {
            Self::Created(channel) | Self::Joined(channel) => &channel.id,
            Self::Renamed { id, .. }
            | Self::Deleted { id }
            | Self::Archived { id }
            | Self::Unarchived { id }
            | Self::Opened { id, .. }
            | Self::Closed { id } => id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Joined(_) => "joined",
            Self::Renamed { .. } => "renamed",
            Self::Deleted { .. } => "deleted",
            Self::Archived { .. } => "archived",
            Self::Unarchived { .. } => "unarchived",
            Self::Opened { .. } => "opened",
            Self::Closed { .. } => "closed",
        }
    }
}

/// A classified event from the event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// The event source greeted us
    Hello,

    /// A (re)connection attempt is in progress
    Connecting,

    /// The connection is up; the directory must be reloaded
    ConnectionEstablished { connection_count: u32 },

    ConnectionLost { reason: String },

    Message(MessageEvent),

    PresenceChange { user: String, presence: Presence },

    DirectoryChange {
        kind: ConversationKind,
        change: DirectoryChange,
    },

    UserChange(User),

    Reaction(ReactionEvent),

    ProtocolError { code: i64, message: String },

    /// A well-formed frame of a type the engine does not model
    Unknown { kind: String },
}

impl Event {
    /// Short, stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Hello => "hello",
            Event::Connecting => "connecting",
            Event::ConnectionEstablished { .. } => "connection_established",
            Event::ConnectionLost { .. } => "connection_lost",
            Event::Message(_) => "message",
            Event::PresenceChange { .. } => "presence_change",
            Event::DirectoryChange { .. } => "directory_change",
            Event::UserChange(_) => "user_change",
            Event::Reaction(_) => "reaction",
            Event::ProtocolError { .. } => "protocol_error",
            Event::Unknown { .. } => "unknown",
        }
    }

    pub fn as_reaction(&self) -> Option<&ReactionEvent> {
        match self {
            Event::Reaction(reaction) => Some(reaction),
            _ => None,
        }
    }
}
