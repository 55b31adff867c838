//! Directory Cache
//!
//! In-memory mirror of the remote workspace's users and conversations.
//!
//! Every read and write, from the dispatch loop or from listener workers,
//! goes through the same `RwLock`. Lookups hand out clones so no guard ever
//! escapes into handler code.
//!
//! Lookups by name or user reference can match several entries. The exact
//! ID wins; otherwise the match with the lexicographically smallest ID is
//! returned, so the result never depends on map iteration order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::domain::{Channel, ConversationKind, DirectoryChange, Presence, Topic, User};
use crate::infrastructure::metrics;

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
}

impl DirectoryState {
    fn publish_sizes(&self) {
        metrics::set_directory_entries(self.users.len(), self.channels.len());
    }
}

/// Concurrency-safe user and conversation cache.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    inner: Arc<RwLock<DirectoryState>>,
}

/// Smallest-ID entry among `candidates`, preferring an exact ID match.
fn pick<'a, T, I>(candidates: I, find: &str, id_of: impl Fn(&T) -> &str) -> Option<&'a T>
where
    I: Iterator<Item = &'a T>,
    T: 'a,
{
    let mut best: Option<&'a T> = None;
    for candidate in candidates {
        let id = id_of(candidate);
        if id == find {
            return Some(candidate);
        }
        if best.map_or(true, |b| id < id_of(b)) {
            best = Some(candidate);
        }
    }
    best
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Replace the whole directory. Entries absent from the arguments are gone
    /// afterwards; nothing from the previous contents is merged in.
    pub fn replace_all<U, C>(&self, users: U, channels: C)
    where
        U: IntoIterator<Item = User>,
        C: IntoIterator<Item = Channel>,
    {
        let users: HashMap<_, _> = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        let channels: HashMap<_, _> = channels.into_iter().map(|c| (c.id.clone(), c)).collect();

        let mut state = self.inner.write();
        state.users = users;
        state.channels = channels;
        state.publish_sizes();

        debug!(
            users = state.users.len(),
            channels = state.channels.len(),
            "Directory replaced"
        );
    }

    /// Insert or overwrite a conversation. Last writer wins.
    pub fn upsert_channel(&self, channel: Channel) {
        if channel.id.is_empty() {
            warn!("Ignoring directory entry without an id");
            return;
        }
        let mut state = self.inner.write();
        state.channels.insert(channel.id.clone(), channel);
        state.publish_sizes();
    }

    pub fn delete_channel(&self, id: &str) -> Option<Channel> {
        let mut state = self.inner.write();
        let removed = state.channels.remove(id);
        state.publish_sizes();
        removed
    }

    /// Mutate an existing conversation in place.
    ///
    /// Returns `false` (and logs) when the ID is unknown; no entry is created.
    pub fn update_channel(&self, id: &str, f: impl FnOnce(&mut Channel)) -> bool {
        let mut state = self.inner.write();
        match state.channels.get_mut(id) {
            Some(channel) => {
                f(channel);
                true
            }
            None => {
                warn!(channel_id = %id, "Update for unknown channel ignored");
                false
            }
        }
    }

    /// Insert or overwrite a user. Last writer wins.
    pub fn upsert_user(&self, user: User) {
        if user.id.is_empty() {
            warn!("Ignoring user entry without an id");
            return;
        }
        let mut state = self.inner.write();
        state.users.insert(user.id.clone(), user);
        state.publish_sizes();
    }

    /// Replace a user's profile from a `user_change`, keeping the presence
    /// already cached since profile updates do not carry one.
    pub fn merge_user(&self, mut user: User) {
        if user.id.is_empty() {
            warn!("Ignoring user entry without an id");
            return;
        }
        let mut state = self.inner.write();
        if let Some(cached) = state.users.get(&user.id) {
            user.presence = cached.presence;
        }
        state.users.insert(user.id.clone(), user);
        state.publish_sizes();
    }

    pub fn delete_user(&self, id: &str) -> Option<User> {
        let mut state = self.inner.write();
        let removed = state.users.remove(id);
        state.publish_sizes();
        removed
    }

    /// Mutate an existing user in place; `false` when the ID is unknown.
    pub fn update_user(&self, id: &str, f: impl FnOnce(&mut User)) -> bool {
        let mut state = self.inner.write();
        match state.users.get_mut(id) {
            Some(user) => {
                f(user);
                true
            }
            None => {
                warn!(user_id = %id, "Update for unknown user ignored");
                false
            }
        }
    }

    pub fn set_presence(&self, id: &str, presence: Presence) -> bool {
        self.update_user(id, |user| user.presence = presence)
    }

    pub fn set_topic(&self, id: &str, topic: Topic) -> bool {
        self.update_channel(id, |channel| channel.topic = topic)
    }

    pub fn set_purpose(&self, id: &str, purpose: Topic) -> bool {
        self.update_channel(id, |channel| channel.purpose = purpose)
    }

    /// Apply one targeted directory change.
    pub fn apply(&self, kind: ConversationKind, change: DirectoryChange) {
        match change {
            DirectoryChange::Created(mut channel) => {
                channel = flag_kind(channel, kind);
                self.upsert_channel(channel);
            }
            DirectoryChange::Joined(mut channel) => {
                channel = flag_kind(channel, kind);
                channel.is_member = true;
                self.upsert_channel(channel);
            }
            DirectoryChange::Renamed { id, name } => {
                self.update_channel(&id, |channel| channel.name = Some(name));
            }
            DirectoryChange::Deleted { id } | DirectoryChange::Closed { id } => {
                if self.delete_channel(&id).is_none() {
                    debug!(channel_id = %id, kind = %kind, "Removal of unknown entry");
                }
            }
            DirectoryChange::Archived { id } => {
                self.update_channel(&id, |channel| channel.is_archived = true);
            }
            DirectoryChange::Unarchived { id } => {
                self.update_channel(&id, |channel| channel.is_archived = false);
            }
            DirectoryChange::Opened { id, user } => {
                if id.is_empty() {
                    warn!("Ignoring open event without an id");
                    return;
                }
                let mut state = self.inner.write();
                let entry = state
                    .channels
                    .entry(id.clone())
                    .or_insert_with(|| Channel::new(id, kind));
                entry.user = user;
                entry.is_open = true;
                state.publish_sizes();
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn channel(&self, id: &str) -> Option<Channel> {
        self.inner.read().channels.get(id).cloned()
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.inner.read().users.get(id).cloned()
    }

    /// Conversation by name; a leading `#` is ignored.
    pub fn channel_by_name(&self, name: &str) -> Option<Channel> {
        let state = self.inner.read();
        let wanted = name.trim_start_matches('#');
        pick(
            state.channels.values().filter(|c| c.has_name(wanted)),
            "",
            |c: &Channel| c.id.as_str(),
        )
        .cloned()
    }

    /// User by ID, handle, real name or email.
    pub fn user_by_ref(&self, find: &str) -> Option<User> {
        let state = self.inner.read();
        if let Some(user) = state.users.get(find) {
            return Some(user.clone());
        }
        pick(
            state.users.values().filter(|u| u.matches_ref(find)),
            find,
            |u: &User| u.id.as_str(),
        )
        .cloned()
    }

    /// The direct conversation with `user_id`, if one is cached.
    pub fn im_channel_with(&self, user_id: &str) -> Option<Channel> {
        let state = self.inner.read();
        pick(
            state
                .channels
                .values()
                .filter(|c| c.is_im && !user_id.is_empty() && c.user == user_id),
            "",
            |c: &Channel| c.id.as_str(),
        )
        .cloned()
    }

    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn channel_count(&self) -> usize {
        self.inner.read().channels.len()
    }

    /// All conversation IDs, sorted.
    pub fn channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.inner.read().channels.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All user IDs, sorted.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.inner.read().users.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn flag_kind(mut channel: Channel, kind: ConversationKind) -> Channel {
    match kind {
        ConversationKind::Channel => channel.is_channel = true,
        ConversationKind::Group => channel.is_group = true,
        ConversationKind::Im => channel.is_im = true,
    }
    channel
}
