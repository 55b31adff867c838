//! Channel entity.
//!
//! One unified shape for public channels, private groups and direct
//! (IM) conversations. This is the directory entry the cache keys by `id`.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::MessageTs;

/// Conversation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Channel,
    Group,
    Im,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Group => "group",
            Self::Im => "im",
        }
    }
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Topic or purpose of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Topic {
    pub value: String,
    pub creator: String,
    /// Unix seconds
    pub last_set: i64,
}

impl Topic {
    /// A topic set by `creator` at message timestamp `ts`.
    pub fn set_by(value: impl Into<String>, creator: impl Into<String>, ts: &MessageTs) -> Self {
        Self {
            value: value.into(),
            creator: creator.into(),
            last_set: ts.unix_seconds(),
        }
    }
}

/// Represents a conversation in the remote workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Channel {
    /// Remote conversation ID (unique, stable)
    pub id: String,

    /// Conversation name (absent for IMs)
    pub name: Option<String>,

    pub is_channel: bool,
    pub is_group: bool,
    pub is_im: bool,

    pub creator: String,

    /// Unix seconds
    pub created: i64,

    /// For IMs: the other participant
    pub user: String,

    pub members: Vec<String>,

    /// Whether the bot is a member
    pub is_member: bool,

    pub is_open: bool,
    pub is_archived: bool,
    pub is_user_deleted: bool,

    pub last_read: String,

    pub topic: Topic,
    pub purpose: Topic,
}

impl Channel {
    /// A bare entry of the given kind, as announced by a create event.
    pub fn new(id: impl Into<String>, kind: ConversationKind) -> Self {
        let mut channel = Self {
            id: id.into(),
            ..Default::default()
        };
        match kind {
            ConversationKind::Channel => channel.is_channel = true,
            ConversationKind::Group => channel.is_group = true,
            ConversationKind::Im => channel.is_im = true,
        }
        channel
    }

    /// The conversation kind derived from the kind flags.
    ///
    /// An entry without any flag is treated as a public channel.
    pub fn kind(&self) -> ConversationKind {
        if self.is_im {
            ConversationKind::Im
        } else if self.is_group {
            ConversationKind::Group
        } else {
            ConversationKind::Channel
        }
    }

    /// Stored name; IMs usually have none.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this entry is named `name` (a leading `#` is ignored).
    pub fn has_name(&self, name: &str) -> bool {
        let name = name.trim_start_matches('#');
        !name.is_empty() && self.name.as_deref() == Some(name)
    }

    /// Whether the conversation is a direct conversation with one user.
    pub fn is_private(&self) -> bool {
        self.is_im
    }
}
