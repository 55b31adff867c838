//! Reaction entity.
//!
//! An emoji reaction added to or removed from a message or file.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::MessageTs;

/// Whether a reaction was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Added,
    Removed,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The item a reaction is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionItem {
    Message { channel: String, ts: MessageTs },
    File { file: String },
    FileComment { file: String, file_comment: String },
}

impl ReactionItem {
    /// Reaction item for the message posted at `ts` in `channel`.
    pub fn message(channel: impl Into<String>, ts: impl Into<MessageTs>) -> Self {
        Self::Message {
            channel: channel.into(),
            ts: ts.into(),
        }
    }
}

/// What a reaction overlay is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionTarget {
    /// A message, identified by its timestamp
    Message(MessageTs),
    /// A file, identified by its ID
    File(String),
}

impl ReactionTarget {
    /// Whether `item` is this target.
    ///
    /// File comments count as reactions on their file.
    pub fn is(&self, item: &ReactionItem) -> bool {
        match (self, item) {
            (Self::Message(want), ReactionItem::Message { ts, .. }) => !want.is_empty() && want == ts,
            (Self::File(want), ReactionItem::File { file })
            | (Self::File(want), ReactionItem::FileComment { file, .. }) => {
                !want.is_empty() && want == file
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for ReactionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(ts) => write!(f, "message:{}", ts),
            Self::File(id) => write!(f, "file:{}", id),
        }
    }
}

/// A parsed reaction event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Who reacted
    pub user: String,

    /// Emoji name without colons
    pub emoji: String,

    pub kind: ReactionKind,

    pub item: ReactionItem,

    pub event_ts: MessageTs,
}

impl ReactionEvent {
    /// Channel of the reacted message, if the item is a message.
    pub fn channel(&self) -> Option<&str> {
        match &self.item {
            ReactionItem::Message { channel, .. } => Some(channel),
            _ => None,
        }
    }
}
