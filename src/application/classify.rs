//! Raw frame classification.
//!
//! Turns one JSON frame from the event source into exactly one [`Event`].
//! Malformed frames become `ProtocolError`; well-formed frames of a type the
//! engine does not model become `Unknown`.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{
    Channel, ConversationKind, DirectoryChange, EditedMessage, Event, MessageEvent, MessageTs,
    Presence, ReactionEvent, ReactionItem, ReactionKind, User,
};

/// Code used for frames that could not be decoded at all.
pub const MALFORMED_FRAME: i64 = -1;

#[derive(Debug, Deserialize)]
struct Renamed {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SubMessage {
    user: String,
    text: String,
    ts: MessageTs,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WireMessage {
    channel: String,
    user: String,
    text: String,
    ts: MessageTs,
    thread_ts: Option<MessageTs>,
    subtype: Option<String>,
    message: Option<SubMessage>,
    topic: Option<String>,
    purpose: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireReaction {
    user: String,
    reaction: String,
    item: ReactionItem,
    #[serde(default)]
    event_ts: MessageTs,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WireError {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Hello,
    Connecting,
    Connected {
        #[serde(default)]
        connection_count: u32,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Message(WireMessage),
    PresenceChange {
        user: String,
        presence: String,
    },
    UserChange {
        user: User,
    },

    ChannelCreated { channel: Channel },
    ChannelJoined { channel: Channel },
    ChannelRename { channel: Renamed },
    ChannelDeleted { channel: String },
    ChannelArchive { channel: String },
    ChannelUnarchive { channel: String },

    GroupCreated { channel: Channel },
    GroupJoined { channel: Channel },
    GroupRename { channel: Renamed },
    GroupClose { channel: String },
    GroupArchive { channel: String },
    GroupUnarchive { channel: String },

    ImCreated {
        #[serde(default)]
        user: String,
        channel: Channel,
    },
    ImOpen {
        #[serde(default)]
        user: String,
        channel: String,
    },
    ImClose { channel: String },

    ReactionAdded(WireReaction),
    ReactionRemoved(WireReaction),

    Error {
        #[serde(default)]
        error: WireError,
    },

    #[serde(other)]
    Other,
}

fn directory(kind: ConversationKind, change: DirectoryChange) -> Event {
    Event::DirectoryChange { kind, change }
}

fn reaction(kind: ReactionKind, wire: WireReaction) -> Event {
    Event::Reaction(ReactionEvent {
        user: wire.user,
        emoji: wire.reaction,
        kind,
        item: wire.item,
        event_ts: wire.event_ts,
    })
}

fn message(wire: WireMessage) -> Event {
    let edited = match (wire.subtype.as_deref(), wire.message) {
        (Some("message_changed"), Some(sub)) => Some(EditedMessage {
            user: sub.user,
            text: sub.text,
            ts: sub.ts,
        }),
        _ => None,
    };
    Event::Message(MessageEvent {
        channel: wire.channel,
        user: wire.user,
        text: wire.text,
        ts: wire.ts,
        thread_ts: wire.thread_ts,
        subtype: wire.subtype,
        edited,
        topic: wire.topic,
        purpose: wire.purpose,
    })
}

impl WireEvent {
    fn into_event(self, kind: &str) -> Event {
        use ConversationKind::{Channel as Chan, Group, Im};

        match self {
            WireEvent::Hello => Event::Hello,
            WireEvent::Connecting => Event::Connecting,
            WireEvent::Connected { connection_count } => {
                Event::ConnectionEstablished { connection_count }
            }
            WireEvent::Disconnected { reason } => Event::ConnectionLost { reason },
            WireEvent::Message(wire) => message(wire),
            WireEvent::PresenceChange { user, presence } => Event::PresenceChange {
                user,
                presence: Presence::from_str(&presence),
            },
            WireEvent::UserChange { user } => Event::UserChange(user),

            WireEvent::ChannelCreated { channel } => directory(Chan, DirectoryChange::Created(channel)),
            WireEvent::ChannelJoined { channel } => directory(Chan, DirectoryChange::Joined(channel)),
            WireEvent::ChannelRename { channel } => directory(
                Chan,
                DirectoryChange::Renamed {
                    id: channel.id,
                    name: channel.name,
                },
            ),
            WireEvent::ChannelDeleted { channel } => {
                directory(Chan, DirectoryChange::Deleted { id: channel })
            }
            WireEvent::ChannelArchive { channel } => {
                directory(Chan, DirectoryChange::Archived { id: channel })
            }
            WireEvent::ChannelUnarchive { channel } => {
                directory(Chan, DirectoryChange::Unarchived { id: channel })
            }

            WireEvent::GroupCreated { channel } => directory(Group, DirectoryChange::Created(channel)),
            WireEvent::GroupJoined { channel } => directory(Group, DirectoryChange::Joined(channel)),
            WireEvent::GroupRename { channel } => directory(
                Group,
                DirectoryChange::Renamed {
                    id: channel.id,
                    name: channel.name,
                },
            ),
            WireEvent::GroupClose { channel } => directory(Group, DirectoryChange::Closed { id: channel }),
            WireEvent::GroupArchive { channel } => {
                directory(Group, DirectoryChange::Archived { id: channel })
            }
            WireEvent::GroupUnarchive { channel } => {
                directory(Group, DirectoryChange::Unarchived { id: channel })
            }

            WireEvent::ImCreated { user, mut channel } => {
                if channel.user.is_empty() {
                    channel.user = user;
                }
                directory(Im, DirectoryChange::Created(channel))
            }
            WireEvent::ImOpen { user, channel } => {
                directory(Im, DirectoryChange::Opened { id: channel, user })
            }
            WireEvent::ImClose { channel } => directory(Im, DirectoryChange::Closed { id: channel }),

            WireEvent::ReactionAdded(wire) => reaction(ReactionKind::Added, wire),
            WireEvent::ReactionRemoved(wire) => reaction(ReactionKind::Removed, wire),

            WireEvent::Error { error } => Event::ProtocolError {
                code: error.code,
                message: error.msg,
            },

            WireEvent::Other => Event::Unknown {
                kind: kind.to_string(),
            },
        }
    }
}

/// Classify one raw frame.
pub fn classify(raw: &str) -> Event {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            return Event::ProtocolError {
                code: MALFORMED_FRAME,
                message: format!("malformed frame: {}", e),
            }
        }
    };

    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        // Acknowledgements of our own sends carry `reply_to` and no type
        None if value.get("reply_to").is_some() => {
            return Event::Unknown {
                kind: "reply".into(),
            }
        }
        None => {
            return Event::ProtocolError {
                code: MALFORMED_FRAME,
                message: "frame without a type".into(),
            }
        }
    };

    match serde_json::from_value::<WireEvent>(value) {
        Ok(wire) => wire.into_event(&kind),
        Err(e) => Event::ProtocolError {
            code: MALFORMED_FRAME,
            message: format!("invalid {} frame: {}", kind, e),
        },
    }
}
