//! Console transport.
//!
//! A local stand-in for the remote service: stdin lines become direct
//! messages from a console user (lines starting with `{` are passed through
//! as raw frames), and everything the bot sends is printed to stdout.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::{
    Channel, ChatClient, ClientError, ConversationKind, DirectorySnapshot, MessageTs,
    OutgoingMessage, ReactionItem, SelfIdentity, SentMessage, User,
};

pub const CONSOLE_USER: &str = "UCONSOLE";
pub const CONSOLE_IM: &str = "DCONSOLE";
pub const CONSOLE_CHANNEL: &str = "CGENERAL";
pub const BOT_USER: &str = "UBOT";

/// Fresh message timestamp: current unix time plus a per-process sequence
/// in the fractional part, so timestamps never collide.
fn next_ts(seq: &AtomicU64) -> MessageTs {
    let n = seq.fetch_add(1, Ordering::Relaxed) % 1_000_000;
    MessageTs::new(format!("{}.{:06}", Utc::now().timestamp(), n))
}

/// [`ChatClient`] printing to stdout.
#[derive(Debug)]
pub struct ConsoleClient {
    bot_name: String,
    seq: AtomicU64,
}

impl ConsoleClient {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// Directory seen by the bot on connection.
    pub fn snapshot(&self) -> DirectorySnapshot {
        let mut general = Channel::new(CONSOLE_CHANNEL, ConversationKind::Channel);
        general.name = Some("general".into());
        general.is_member = true;
        general.members = vec![BOT_USER.into(), CONSOLE_USER.into()];

        let mut im = Channel::new(CONSOLE_IM, ConversationKind::Im);
        im.user = CONSOLE_USER.into();
        im.is_open = true;

        DirectorySnapshot {
            myself: SelfIdentity {
                id: BOT_USER.into(),
                name: self.bot_name.clone(),
            },
            users: vec![
                User {
                    id: CONSOLE_USER.into(),
                    name: "console".into(),
                    real_name: "Console User".into(),
                    ..Default::default()
                },
                User {
                    id: BOT_USER.into(),
                    name: self.bot_name.clone(),
                    is_bot: true,
                    ..Default::default()
                },
            ],
            channels: vec![general],
            ims: vec![im],
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChatClient for ConsoleClient {
    async fn fetch_directory(&self) -> Result<DirectorySnapshot, ClientError> {
        Ok(self.snapshot())
    }

    async fn join_channel(&self, name: &str) -> Result<Channel, ClientError> {
        let id = format!("C{}", name.to_uppercase());
        let mut channel = Channel::new(id, ConversationKind::Channel);
        channel.name = Some(name.to_string());
        channel.is_member = true;
        println!("* joined #{}", name);
        Ok(channel)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<SentMessage, ClientError> {
        let ts = next_ts(&self.seq);
        println!("[{}] {}: {}", message.channel, self.bot_name, message.text);
        Ok(SentMessage {
            channel: message.channel.clone(),
            ts,
        })
    }

    async fn open_im(&self, user_id: &str) -> Result<String, ClientError> {
        if user_id.is_empty() {
            return Err(ClientError::Protocol("user_not_found".into()));
        }
        Ok(format!("D{}", user_id.trim_start_matches('U')))
    }

    async fn add_reaction(&self, emoji: &str, item: &ReactionItem) -> Result<(), ClientError> {
        println!("* reacted :{}: to {:?}", emoji, item);
        Ok(())
    }

    async fn remove_reaction(&self, emoji: &str, item: &ReactionItem) -> Result<(), ClientError> {
        println!("* removed :{}: from {:?}", emoji, item);
        Ok(())
    }
}

/// Turn one console line into a raw frame. Blank lines yield nothing.
pub fn line_to_frame(line: &str, ts: &MessageTs) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') {
        return Some(line.to_string());
    }
    Some(
        json!({
            "type": "message",
            "channel": CONSOLE_IM,
            "user": CONSOLE_USER,
            "text": line,
            "ts": ts.as_str(),
        })
        .to_string(),
    )
}

/// Feed `reader` into the dispatcher's event channel: a greeting and a
/// connection frame first, then one frame per line until EOF.
pub async fn pump_lines<R>(reader: R, events: mpsc::Sender<String>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let seq = AtomicU64::new(0);
    for frame in [
        json!({"type": "hello"}),
        json!({"type": "connected", "connection_count": 1}),
    ] {
        if events.send(frame.to_string()).await.is_err() {
            return Ok(());
        }
    }

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(frame) = line_to_frame(&line, &next_ts(&seq)) else {
            continue;
        };
        debug!(frame = %frame, "Console frame");
        if events.send(frame).await.is_err() {
            break;
        }
    }
    info!("Console input closed");
    Ok(())
}
