//! Event Dispatcher
//!
//! The single consumer of the raw event stream. Every frame goes through one
//! cycle:
//!
//! 1. merge pending listener additions
//! 2. drain pending removals
//! 3. classify the frame
//! 4. apply side effects (directory cache, identity)
//! 5. fan out to the active listeners, in registration order
//! 6. drain removals requested during fan-out
//!
//! Cycles never overlap, so cache mutations from one event are visible to
//! every handler of that event and of all later ones.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::bot::Bot;
use super::classify::classify;
use super::listener::{guarded, HandlerContext, Incoming};
use super::registry::Registry;
use crate::domain::{
    ConversationKind, DirectoryChange, DirectorySnapshot, Event, Message, MessageEvent, Topic,
};
use crate::infrastructure::metrics;
use crate::infrastructure::outbox::SenderLoop;

/// Owns the registry and drives the bot.
pub struct Dispatcher {
    bot: Bot,
    registry: Registry,
    sender: Option<SenderLoop>,
}

impl Dispatcher {
    pub(crate) fn new(bot: Bot, registry: Registry, sender: SenderLoop) -> Self {
        Self {
            bot,
            registry,
            sender: Some(sender),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Start the paced sender loop. Only the first call spawns anything.
    pub fn spawn_sender(&mut self) -> Option<JoinHandle<()>> {
        self.sender.take().map(|sender| tokio::spawn(sender.run()))
    }

    /// Dispatch every frame of `events` until the stream ends or the bot is
    /// shut down, then stop the sender loop and all managed workers.
    pub async fn run(mut self, mut events: mpsc::Receiver<String>) {
        let sender = self.spawn_sender();
        let shutdown = self.bot.shutdown_token();
        info!("Dispatcher started");

        loop {
            let raw = tokio::select! {
                _ = shutdown.cancelled() => break,
                raw = events.recv() => match raw {
                    Some(raw) => raw,
                    None => break,
                },
            };
            self.dispatch(&raw).await;
        }

        self.flush_outbox().await;
        self.bot.shutdown();
        if let Some(sender) = sender {
            if let Err(e) = sender.await {
                error!(error = %e, "Sender loop task failed");
            }
        }
        info!("Dispatcher stopped");
    }

    /// Give queued sends a chance to go out before stopping.
    async fn flush_outbox(&self) {
        if self.bot.is_shut_down() {
            return;
        }
        let dispatch = &self.bot.settings().dispatch;
        let step = dispatch.send_interval().max(Duration::from_millis(10));
        let flushed = tokio::time::timeout(dispatch.ack_timeout(), async {
            while self.bot.pending_sends() > 0 {
                tokio::time::sleep(step).await;
            }
        })
        .await;
        if flushed.is_err() {
            warn!(pending = self.bot.pending_sends(), "Stopping with unsent replies");
        }
    }

    /// Run one cycle for a raw frame.
    pub async fn dispatch(&mut self, raw: &str) {
        self.dispatch_event(classify(raw)).await;
    }

    /// Run one cycle for an already classified event.
    #[instrument(skip(self, event), fields(kind = event.kind()))]
    pub async fn dispatch_event(&mut self, event: Event) {
        self.registry.merge_pending();
        self.registry.drain_removals();
        metrics::record_event(event.kind());

        let message = self.apply(&event).await;
        self.fan_out(&event, message.as_ref());

        self.registry.drain_removals();
    }

    // ========================================================================
    // Side effects
    // ========================================================================

    async fn apply(&self, event: &Event) -> Option<Message> {
        let directory = self.bot.directory();
        match event {
            Event::ConnectionEstablished { connection_count } => {
                info!(connection_count, "Connection established");
                self.reload_directory().await;
                None
            }
            Event::ConnectionLost { reason } => {
                warn!(reason = %reason, "Connection lost");
                None
            }
            Event::Message(ev) => Some(self.normalize(ev)),
            Event::PresenceChange { user, presence } => {
                directory.set_presence(user, *presence);
                None
            }
            Event::DirectoryChange { kind, change } => {
                debug!(kind = %kind, change = change.as_str(), id = change.id(), "Directory change");
                directory.apply(*kind, change.clone());
                None
            }
            Event::UserChange(user) => {
                directory.merge_user(user.clone());
                None
            }
            Event::ProtocolError { code, message } => {
                error!(code, message = %message, "Protocol error from event source");
                None
            }
            Event::Unknown { kind } => {
                debug!(kind = %kind, "Unhandled event type");
                None
            }
            Event::Hello | Event::Connecting | Event::Reaction(_) => None,
        }
    }

    /// Full reload of identity and directory, then auto-join.
    ///
    /// Transient failures are retried with backoff. If the fetch still fails
    /// the previous cache stays in place.
    async fn reload_directory(&self) {
        let client = self.bot.client().as_ref();
        let policy = self.bot.settings().dispatch.directory_fetch_retry();

        let snapshot = match policy
            .run("fetch_directory", move || client.fetch_directory())
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_transient() => {
                error!(error = %e, "Directory fetch kept failing; keeping stale directory");
                return;
            }
            Err(e) => {
                error!(error = %e, "Directory fetch rejected; keeping stale directory");
                return;
            }
        };

        let DirectorySnapshot {
            myself,
            users,
            channels,
            groups,
            ims,
        } = snapshot;
        self.bot.set_myself(myself);
        self.bot.directory().replace_all(
            users,
            channels.into_iter().chain(groups).chain(ims),
        );
        info!(
            users = self.bot.directory().user_count(),
            channels = self.bot.directory().channel_count(),
            "Directory loaded"
        );

        self.auto_join().await;
    }

    async fn auto_join(&self) {
        let client = self.bot.client().as_ref();
        let policy = self.bot.settings().dispatch.send_retry();
        let directory = self.bot.directory();

        for name in &self.bot.settings().bot.join_channels {
            let name = name.trim_start_matches('#');
            if name.is_empty() {
                continue;
            }
            if directory.channel_by_name(name).is_some_and(|c| c.is_member) {
                continue;
            }
            match policy.run("join_channel", move || client.join_channel(name)).await {
                Ok(channel) => {
                    info!(channel = name, channel_id = %channel.id, "Joined channel");
                    directory.apply(ConversationKind::Channel, DirectoryChange::Joined(channel));
                }
                Err(e) => warn!(channel = name, error = %e, "Could not join channel"),
            }
        }
    }

    /// Build the listener-facing message, refreshing topic/purpose entries
    /// on the way.
    fn normalize(&self, ev: &MessageEvent) -> Message {
        let directory = self.bot.directory();

        match ev.subtype.as_deref() {
            Some("channel_topic" | "group_topic") => {
                if let Some(topic) = &ev.topic {
                    directory.set_topic(&ev.channel, Topic::set_by(topic, &ev.user, &ev.ts));
                }
            }
            Some("channel_purpose" | "group_purpose") => {
                if let Some(purpose) = &ev.purpose {
                    directory.set_purpose(&ev.channel, Topic::set_by(purpose, &ev.user, &ev.ts));
                }
            }
            _ => {}
        }

        let (user, text, timestamp) = match &ev.edited {
            Some(edit) => {
                let ts = if edit.ts.is_empty() { &ev.ts } else { &edit.ts };
                (edit.user.clone(), edit.text.clone(), ts.clone())
            }
            None => (ev.user.clone(), ev.text.clone(), ev.ts.clone()),
        };

        let from_user = if user.is_empty() {
            None
        } else {
            let found = directory.user(&user);
            if found.is_none() {
                debug!(user_id = %user, "Author not in directory");
            }
            found
        };
        let from_channel = directory.channel(&ev.channel);
        if from_channel.is_none() && !ev.channel.is_empty() {
            debug!(channel_id = %ev.channel, "Conversation not in directory");
        }

        let mut msg = Message {
            channel: ev.channel.clone(),
            user,
            text,
            timestamp,
            thread_ts: ev.thread_ts.clone(),
            subtype: ev.subtype.clone(),
            is_edit: ev.is_edit(),
            from_user,
            from_channel,
            ..Default::default()
        };

        let me = self.bot.myself();
        msg.apply_mentions_me(&me.id);
        msg.apply_from_me(&me.id);
        msg
    }

    // ========================================================================
    // Fan-out
    // ========================================================================

    /// Deliver to every active listener. Returns the handler invocations.
    fn fan_out(&self, event: &Event, message: Option<&Message>) -> usize {
        let mut invocations = 0;

        for handle in self.registry.active() {
            if !handle.is_active() {
                continue;
            }
            let listener = handle.definition();
            let ctx = HandlerContext {
                bot: &self.bot,
                listener: handle,
            };

            if let (Some(msg), Some(on_message)) = (message, &listener.message_handler) {
                if let Some(captures) = listener.filter.evaluate(msg) {
                    let matched;
                    let msg = if captures.is_empty() {
                        msg
                    } else {
                        matched = Message {
                            matches: captures,
                            ..msg.clone()
                        };
                        &matched
                    };
                    guarded(handle.id(), "message", || on_message(&ctx, msg));
                    invocations += 1;
                }
            }

            if let Some(on_event) = &listener.event_handler {
                // The message handler may have closed its own listener
                if !handle.is_active() {
                    continue;
                }
                let incoming = match message {
                    Some(msg) => Incoming::Message(msg),
                    None => Incoming::Event(event),
                };
                guarded(handle.id(), "event", || on_event(&ctx, incoming));
                invocations += 1;
            }
        }

        invocations
    }
}
