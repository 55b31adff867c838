//! User mention tokens embedded in message text.
//!
//! A mention looks like `<@U024BE7LH>` or `<@U024BE7LH|bob>`.

use once_cell::sync::Lazy;
use regex::Regex;

static MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<@([A-Z0-9]+)(?:\|([^>]+))?>").expect("mention pattern is valid")
});

/// A single mention token found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention<'a> {
    /// Mentioned user ID
    pub user_id: &'a str,
    /// Optional label after the `|`
    pub label: Option<&'a str>,
}

/// Iterate every mention token in `text`, in order of appearance.
pub fn mentions(text: &str) -> impl Iterator<Item = Mention<'_>> {
    MENTION.captures_iter(text).filter_map(|caps| {
        let user_id = caps.get(1)?.as_str();
        Some(Mention {
            user_id,
            label: caps.get(2).map(|m| m.as_str()),
        })
    })
}

/// Whether `text` mentions `user_id`.
pub fn mentions_user(text: &str, user_id: &str) -> bool {
    !user_id.is_empty() && mentions(text).any(|m| m.user_id == user_id)
}

/// Render a mention token for `user`.
pub fn mention_token(user: &str) -> String {
    format!("<@{}>", user)
}
