//! Message entity.
//!
//! The normalized projection of a raw message event, enriched from the
//! directory and from the bot's own identity.

use serde::{Deserialize, Serialize};

use super::{Channel, User};
use crate::domain::value_objects::{mentions_user, MessageTs};

/// Represents a chat message as seen by listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Message {
    /// Conversation ID the message was posted in
    pub channel: String,

    /// Author ID (for edits: the author of the edited message)
    pub user: String,

    pub text: String,

    pub timestamp: MessageTs,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<MessageTs>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    /// The message is an edit of an earlier one
    pub is_edit: bool,

    /// The message addresses the bot (direct conversation or mention)
    pub mentions_me: bool,

    /// The bot authored the message
    pub from_me: bool,

    /// Author, resolved from the directory (None when the cache missed)
    pub from_user: Option<User>,

    /// Conversation, resolved from the directory (None when the cache missed)
    pub from_channel: Option<Channel>,

    /// Capture groups of the listener's pattern, index 0 being the whole match.
    ///
    /// Only populated for listeners that declare a pattern.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<Option<String>>,
}

impl Message {
    /// Whether the message was posted in a direct conversation.
    ///
    /// Uses the resolved conversation when available, falling back to the
    /// `D` prefix of direct-conversation IDs on a cache miss.
    pub fn is_private(&self) -> bool {
        match &self.from_channel {
            Some(channel) => channel.is_private(),
            None => self.channel.starts_with('D'),
        }
    }

    /// Case-insensitive single substring search.
    pub fn contains(&self, s: &str) -> bool {
        self.text.to_lowercase().contains(&s.to_lowercase())
    }

    /// Case-insensitive: at least one of `strs` occurs.
    pub fn contains_any<S: AsRef<str>>(&self, strs: &[S]) -> bool {
        let text = self.text.to_lowercase();
        strs.iter()
            .any(|s| text.contains(&s.as_ref().to_lowercase()))
    }

    /// Case-sensitive: at least one of `strs` occurs.
    pub fn contains_any_cased<S: AsRef<str>>(&self, strs: &[S]) -> bool {
        strs.iter().any(|s| self.text.contains(s.as_ref()))
    }

    /// Case-insensitive: every one of `strs` occurs.
    pub fn contains_all<S: AsRef<str>>(&self, strs: &[S]) -> bool {
        let text = self.text.to_lowercase();
        strs.iter()
            .all(|s| text.contains(&s.as_ref().to_lowercase()))
    }

    /// Case-sensitive prefix test.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }

    /// Capture group `index` of the listener's pattern, if it participated.
    pub fn match_group(&self, index: usize) -> Option<&str> {
        self.matches.get(index).and_then(|m| m.as_deref())
    }

    /// Where a reply to this message goes: the conversation, or the author
    /// when the conversation is unknown.
    pub fn reply_target(&self) -> &str {
        if self.channel.is_empty() {
            &self.user
        } else {
            &self.channel
        }
    }

    /// Flag the message as addressing the bot when it is private or carries
    /// a mention token for `self_id`.
    pub fn apply_mentions_me(&mut self, self_id: &str) {
        if self.is_private() || mentions_user(&self.text, self_id) {
            self.mentions_me = true;
        }
    }

    /// Flag the message as authored by the bot.
    pub fn apply_from_me(&mut self, self_id: &str) {
        if !self.user.is_empty() && self.user == self_id {
            self.from_me = true;
        }
    }
}
