//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use chatops_bot::application::{Bot, Dispatcher, Listener, ListenerHandle};
use chatops_bot::config::Settings;
use chatops_bot::domain::{
    Channel, ChatClient, ClientError, ConversationKind, DirectorySnapshot, MessageTs,
    OutgoingMessage, ReactionItem, SelfIdentity, SentMessage, User,
};

pub const BOT_ID: &str = "UBOT";
pub const ALICE: &str = "UALICE";
pub const BOB: &str = "UBOB";
pub const GENERAL: &str = "CGENERAL";
pub const ALICE_IM: &str = "DALICE";

/// In-memory transport recording every outbound call.
#[derive(Default)]
pub struct RecordingClient {
    pub snapshot: Mutex<DirectorySnapshot>,
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub reactions: Mutex<Vec<(String, ReactionItem)>>,
    pub joined: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
    pub fetches: AtomicUsize,
    /// Number of upcoming sends that fail permanently
    pub failing_sends: AtomicU32,
    seq: AtomicU64,
}

impl RecordingClient {
    pub fn new(snapshot: DirectorySnapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            ..Default::default()
        })
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl ChatClient for RecordingClient {
    async fn fetch_directory(&self) -> Result<DirectorySnapshot, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.lock().clone())
    }

    async fn join_channel(&self, name: &str) -> Result<Channel, ClientError> {
        self.joined.lock().push(name.to_string());
        Ok(channel(&format!("C{}", name.to_uppercase()), name, true))
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, ClientError> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ClientError::Protocol("channel_not_found".into()));
        }
        self.sent.lock().push(message.clone());
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SentMessage {
            channel: message.channel.clone(),
            ts: MessageTs::new(format!("1700000000.{:06}", n)),
        })
    }

    async fn open_im(&self, user_id: &str) -> Result<String, ClientError> {
        self.opened.lock().push(user_id.to_string());
        Ok(format!("D{}", user_id.trim_start_matches('U')))
    }

    async fn add_reaction(&self, emoji: &str, item: &ReactionItem) -> Result<(), ClientError> {
        self.reactions.lock().push((emoji.to_string(), item.clone()));
        Ok(())
    }

    async fn remove_reaction(&self, _emoji: &str, _item: &ReactionItem) -> Result<(), ClientError> {
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.into(),
        name: name.into(),
        real_name: format!("{} Example", name),
        ..Default::default()
    }
}

pub fn channel(id: &str, name: &str, is_member: bool) -> Channel {
    let mut channel = Channel::new(id, ConversationKind::Channel);
    channel.name = Some(name.into());
    channel.is_member = is_member;
    channel
}

pub fn im(id: &str, user: &str) -> Channel {
    let mut im = Channel::new(id, ConversationKind::Im);
    im.user = user.into();
    im.is_open = true;
    im
}

/// Workspace with the bot, Alice and Bob, `#general`, and a direct
/// conversation with Alice.
pub fn workspace() -> DirectorySnapshot {
    DirectorySnapshot {
        myself: SelfIdentity {
            id: BOT_ID.into(),
            name: "opsbot".into(),
        },
        users: vec![
            user(BOT_ID, "opsbot"),
            user(ALICE, "alice"),
            user(BOB, "bob"),
        ],
        channels: vec![channel(GENERAL, "general", true)],
        ims: vec![im(ALICE_IM, ALICE)],
        ..Default::default()
    }
}

/// Settings with fast pacing.
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.dispatch.send_interval_ms = 1;
    settings.dispatch.send_retry_base_ms = 1;
    settings.dispatch.ack_timeout_secs = 5;
    settings
}

pub struct TestBot {
    pub bot: Bot,
    pub dispatcher: Dispatcher,
    pub client: Arc<RecordingClient>,
}

impl TestBot {
    pub fn new(settings: Settings) -> Self {
        let client = RecordingClient::new(workspace());
        let (bot, dispatcher) = Bot::new(settings, client.clone());
        Self {
            bot,
            dispatcher,
            client,
        }
    }

    /// A bot that has processed a connection and loaded [`workspace`].
    pub async fn connected() -> Self {
        Self::connected_with(settings()).await
    }

    pub async fn connected_with(settings: Settings) -> Self {
        let mut test = Self::new(settings);
        test.dispatch(connected()).await;
        test
    }

    pub async fn dispatch(&mut self, raw: impl AsRef<str>) {
        self.dispatcher.dispatch(raw.as_ref()).await;
    }

    /// Register a message listener counting its invocations.
    pub fn count_messages(&self, listener: Listener) -> (ListenerHandle, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let handle = self
            .bot
            .listen(listener.on_message(move |_, _| {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .expect("valid listener");
        (handle, hits)
    }
}

// ============================================================================
// Raw frames
// ============================================================================

pub fn connected() -> String {
    json!({"type": "connected", "connection_count": 1}).to_string()
}

pub fn message(channel: &str, user: &str, text: &str) -> String {
    message_at(channel, user, text, "1700000100.000100")
}

pub fn message_at(channel: &str, user: &str, text: &str, ts: &str) -> String {
    json!({
        "type": "message",
        "channel": channel,
        "user": user,
        "text": text,
        "ts": ts,
    })
    .to_string()
}

pub fn reaction_added(user: &str, emoji: &str, channel: &str, ts: &str) -> String {
    json!({
        "type": "reaction_added",
        "user": user,
        "reaction": emoji,
        "item": {"type": "message", "channel": channel, "ts": ts},
        "event_ts": "1700000200.000001",
    })
    .to_string()
}

pub fn hits(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
