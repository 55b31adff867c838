//! User entity.
//!
//! Mirrors a remote workspace member as delivered by the event source.

use serde::{Deserialize, Serialize};

/// Presence state reported by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Active,
    #[default]
    Away,
}

impl Presence {
    /// Convert from the wire representation. Anything but `active` is `away`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => Self::Active,
            _ => Self::Away,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Away => "away",
        }
    }
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Profile fields of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UserProfile {
    pub email: String,
    pub real_name: String,
    pub display_name: String,
}

/// Represents a member of the remote workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct User {
    /// Remote user ID (unique)
    pub id: String,

    /// Handle
    pub name: String,

    /// Full name
    pub real_name: String,

    pub profile: UserProfile,

    pub presence: Presence,

    pub is_bot: bool,

    pub deleted: bool,
}

impl User {
    /// Whether `find` refers to this user by ID, handle, real name or email.
    pub fn matches_ref(&self, find: &str) -> bool {
        !find.is_empty()
            && (self.id == find
                || self.name == find
                || self.real_name == find
                || self.profile.real_name == find
                || self.profile.email == find)
    }

    /// Display name, falling back to the handle.
    pub fn display_name_or_name(&self) -> &str {
        if self.profile.display_name.is_empty() {
            &self.name
        } else {
            &self.profile.display_name
        }
    }

    pub fn is_active(&self) -> bool {
        self.presence == Presence::Active
    }
}

/// The bot's own identity, as reported when a connection is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SelfIdentity {
    pub id: String,
    pub name: String,
}
