//! Outbound transport contract.
//!
//! The engine never talks to the network itself. Everything it needs from
//! the remote service goes through [`ChatClient`], implemented by the
//! transport layer (and by test doubles).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::entities::{Channel, ReactionItem, SelfIdentity, User};
use super::value_objects::MessageTs;

/// Errors reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Network hiccup, rate limit, timeout: worth retrying
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// The remote side rejected the request or spoke an incompatible protocol
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

/// Result of a bulk directory fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DirectorySnapshot {
    #[serde(rename = "self")]
    pub myself: SelfIdentity,
    pub users: Vec<User>,
    pub channels: Vec<Channel>,
    pub groups: Vec<Channel>,
    pub ims: Vec<Channel>,
}

impl DirectorySnapshot {
    /// Channels, groups and direct conversations in one sequence.
    pub fn conversations(&self) -> impl Iterator<Item = &Channel> {
        self.channels
            .iter()
            .chain(self.groups.iter())
            .chain(self.ims.iter())
    }
}

/// A text message ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Conversation ID
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<MessageTs>,
}

impl OutgoingMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            thread_ts: None,
        }
    }
}

/// Acknowledgement of a posted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub channel: String,
    pub ts: MessageTs,
}

/// Calls the engine makes against the remote service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Fetch the full directory and the bot's own identity.
    async fn fetch_directory(&self) -> Result<DirectorySnapshot, ClientError>;

    /// Join a channel by name.
    async fn join_channel(&self, name: &str) -> Result<Channel, ClientError>;

    /// Post a text message.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, ClientError>;

    /// Open (or find) the direct conversation with a user; returns its ID.
    async fn open_im(&self, user_id: &str) -> Result<String, ClientError>;

    async fn add_reaction(&self, emoji: &str, item: &ReactionItem) -> Result<(), ClientError>;

    async fn remove_reaction(&self, emoji: &str, item: &ReactionItem) -> Result<(), ClientError>;
}
