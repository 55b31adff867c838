//! Message filter evaluated before a listener's message handler runs.

use regex::Regex;

use crate::domain::Message;

/// Capture groups of a positive match; empty when no pattern is declared.
pub type Captures = Vec<Option<String>>;

/// Criteria a message must satisfy to reach a message handler.
///
/// Substring and pattern tests run against the message text. Allow-lists
/// accept IDs or names.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub mentions_me_only: bool,
    pub private_only: bool,
    pub public_only: bool,
    pub listen_for_edits: bool,
    pub match_my_messages: bool,

    /// Case-insensitive substring
    pub contains: Option<String>,

    /// Case-insensitive; at least one must occur
    pub contains_any: Vec<String>,

    /// Case-sensitive; at least one must occur
    pub contains_any_cased: Vec<String>,

    pub matches: Option<Regex>,

    pub from_users: Option<Vec<String>>,
    pub from_channels: Option<Vec<String>>,
}

impl MessageFilter {
    /// Evaluate `msg`; `Some(captures)` on a positive match.
    pub fn evaluate(&self, msg: &Message) -> Option<Captures> {
        if msg.is_edit && !self.listen_for_edits {
            return None;
        }
        if msg.from_me && !self.match_my_messages {
            return None;
        }
        if self.mentions_me_only && !msg.mentions_me {
            return None;
        }
        if self.private_only && !msg.is_private() {
            return None;
        }
        if self.public_only && msg.is_private() {
            return None;
        }

        if let Some(users) = &self.from_users {
            let name = msg.from_user.as_ref().map(|u| u.name.as_str());
            if !users.iter().any(|u| *u == msg.user || Some(u.as_str()) == name) {
                return None;
            }
        }

        if let Some(channels) = &self.from_channels {
            let name = msg.from_channel.as_ref().and_then(|c| c.name());
            let allowed = channels.iter().any(|c| {
                *c == msg.channel || Some(c.trim_start_matches('#')) == name
            });
            if !allowed {
                return None;
            }
        }

        if let Some(needle) = &self.contains {
            if !msg.contains(needle) {
                return None;
            }
        }
        if !self.contains_any.is_empty() && !msg.contains_any(&self.contains_any) {
            return None;
        }
        if !self.contains_any_cased.is_empty() && !msg.contains_any_cased(&self.contains_any_cased) {
            return None;
        }

        match &self.matches {
            Some(pattern) => {
                let caps = pattern.captures(&msg.text)?;
                Some(
                    caps.iter()
                        .map(|m| m.map(|m| m.as_str().to_string()))
                        .collect(),
                )
            }
            None => Some(Vec::new()),
        }
    }

    /// Contradictory combinations, described for the registration error.
    pub fn contradiction(&self) -> Option<&'static str> {
        if self.private_only && self.public_only {
            return Some("private_only and public_only are mutually exclusive");
        }
        if matches!(&self.from_users, Some(users) if users.is_empty()) {
            return Some("from_users is empty; no message could match");
        }
        if matches!(&self.from_channels, Some(channels) if channels.is_empty()) {
            return Some("from_channels is empty; no message could match");
        }
        None
    }
}
