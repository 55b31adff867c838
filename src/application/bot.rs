//! Bot context.
//!
//! [`Bot`] is the explicit context object handed to handlers, plugins and
//! managed workers. It owns nothing dispatcher-private: listeners go through
//! the registry queues, sends go through the outbox, and lookups go through
//! the synchronized directory.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::dispatcher::Dispatcher;
use super::listener::managed::ManagedPool;
use super::listener::{Listener, ListenerHandle};
use super::reaction::ReactionListener;
use super::registry::{Registry, RegistryQueues};
use super::reply::Reply;
use crate::config::Settings;
use crate::domain::{
    mention_token, Channel, ChatClient, Message, ReactionItem, ReactionTarget, SelfIdentity, User,
};
use crate::infrastructure::cache::Directory;
use crate::infrastructure::outbox::{Delivery, Destination, OutboundAction, Outbox, SenderLoop};
use crate::shared::error::BotError;

struct BotInner {
    settings: Arc<Settings>,
    directory: Directory,
    queues: RegistryQueues,
    outbox: Outbox,
    client: Arc<dyn ChatClient>,
    myself: RwLock<SelfIdentity>,
    managed: ManagedPool,
    shutdown: CancellationToken,
}

/// Shared bot context. Cheap to clone.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Bot {
    /// Create a bot and the dispatcher that drives it.
    pub fn new(settings: Settings, client: Arc<dyn ChatClient>) -> (Bot, Dispatcher) {
        let settings = Arc::new(settings);
        let dispatch = &settings.dispatch;
        let shutdown = CancellationToken::new();
        let directory = Directory::new();
        let queues = RegistryQueues::default();
        let (outbox, rx) = Outbox::channel(dispatch.reply_queue_capacity);

        let sender = SenderLoop::new(
            rx,
            Arc::clone(&client),
            directory.clone(),
            dispatch.send_interval(),
            dispatch.send_retry(),
            shutdown.clone(),
        );
        let managed = ManagedPool::new(dispatch.max_managed_listeners, shutdown.clone());

        let bot = Bot {
            inner: Arc::new(BotInner {
                settings: Arc::clone(&settings),
                directory,
                queues: queues.clone(),
                outbox,
                client,
                myself: RwLock::new(SelfIdentity::default()),
                managed,
                shutdown,
            }),
        };
        let dispatcher = Dispatcher::new(bot.clone(), Registry::new(queues), sender);
        (bot, dispatcher)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener. It becomes active at the start of the next
    /// dispatch cycle.
    ///
    /// Fails synchronously, recording nothing, when the definition is
    /// invalid or the managed worker pool is exhausted.
    pub fn listen(&self, listener: Listener) -> Result<ListenerHandle, BotError> {
        listener.validate()?;
        let inner = &self.inner;

        if !listener.is_managed() {
            let handle = ListenerHandle::new(listener, None, inner.queues.clone());
            inner.queues.push_add(handle.clone());
            debug!(listener_id = %handle.id(), "Listener registered");
            return Ok(handle);
        }

        let (control, slot) = inner.managed.prepare(&listener)?;
        let handle = ListenerHandle::new(listener, Some(control), inner.queues.clone());
        inner.queues.push_add(handle.clone());
        inner.managed.spawn(self.clone(), handle.clone(), slot);
        debug!(listener_id = %handle.id(), "Managed listener registered");
        Ok(handle)
    }

    /// Register a reaction overlay bound to `target`.
    pub fn listen_reaction(
        &self,
        target: ReactionTarget,
        overlay: ReactionListener,
    ) -> Result<ListenerHandle, BotError> {
        self.listen(overlay.into_listener(target)?)
    }

    /// Managed workers running, and free worker slots.
    pub fn managed_workers(&self) -> (usize, usize) {
        (self.inner.managed.running(), self.inner.managed.available())
    }

    // ========================================================================
    // Sending
    // ========================================================================

    fn send(&self, destination: Destination, text: impl Into<String>) -> Result<Reply, BotError> {
        let delivery = self
            .inner
            .outbox
            .try_enqueue(OutboundAction::message(destination.clone(), text))?;
        Ok(Reply::new(self.clone(), destination, delivery))
    }

    /// Queue a message for a conversation ID.
    pub fn send_outgoing_message(
        &self,
        text: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Result<Reply, BotError> {
        self.send(Destination::Channel(channel_id.into()), text)
    }

    /// Queue a message for a conversation looked up by name.
    pub fn send_to_channel(&self, name: &str, text: impl Into<String>) -> Result<Reply, BotError> {
        let channel = self
            .inner
            .directory
            .channel_by_name(name)
            .ok_or_else(|| BotError::ChannelNotFound(name.to_string()))?;
        self.send(Destination::Channel(channel.id), text)
    }

    /// Queue a direct message for a user looked up by ID, name or email.
    pub fn send_private_message(
        &self,
        user_ref: &str,
        text: impl Into<String>,
    ) -> Result<Reply, BotError> {
        let user = self
            .inner
            .directory
            .user_by_ref(user_ref)
            .ok_or_else(|| BotError::UserNotFound(user_ref.to_string()))?;
        self.send(Destination::User(user.id), text)
    }

    /// Answer in the conversation of `msg`, or to its author when the
    /// conversation is unknown.
    pub fn reply(&self, msg: &Message, text: impl Into<String>) -> Result<Reply, BotError> {
        if msg.channel.is_empty() {
            self.send(Destination::User(msg.user.clone()), text)
        } else {
            self.send(Destination::Channel(msg.channel.clone()), text)
        }
    }

    /// Like [`Bot::reply`], mentioning the author when the conversation is
    /// public.
    pub fn reply_mention(&self, msg: &Message, text: impl Into<String>) -> Result<Reply, BotError> {
        if msg.is_private() {
            return self.reply(msg, text);
        }
        let text = format!("{} {}", mention_token(&msg.user), text.into());
        self.reply(msg, text)
    }

    /// Answer the author of `msg` in a direct conversation.
    pub fn reply_privately(&self, msg: &Message, text: impl Into<String>) -> Result<Reply, BotError> {
        self.send(Destination::User(msg.user.clone()), text)
    }

    pub fn add_reaction(&self, msg: &Message, emoji: &str) -> Result<Delivery, BotError> {
        self.react(OutboundAction::AddReaction {
            emoji: emoji.trim_matches(':').to_string(),
            item: ReactionItem::message(msg.channel.clone(), msg.timestamp.clone()),
        })
    }

    pub fn remove_reaction(&self, msg: &Message, emoji: &str) -> Result<Delivery, BotError> {
        self.react(OutboundAction::RemoveReaction {
            emoji: emoji.trim_matches(':').to_string(),
            item: ReactionItem::message(msg.channel.clone(), msg.timestamp.clone()),
        })
    }

    pub(crate) fn react(&self, action: OutboundAction) -> Result<Delivery, BotError> {
        self.inner.outbox.try_enqueue(action)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// User by ID, name, real name or email.
    pub fn get_user(&self, find: &str) -> Option<User> {
        self.inner.directory.user_by_ref(find)
    }

    pub fn get_channel_by_name(&self, name: &str) -> Option<Channel> {
        self.inner.directory.channel_by_name(name)
    }

    pub fn get_im_channel_with(&self, user_id: &str) -> Option<Channel> {
        self.inner.directory.im_channel_with(user_id)
    }

    /// The bot's own identity; empty until the first connection.
    pub fn myself(&self) -> SelfIdentity {
        self.inner.myself.read().clone()
    }

    pub(crate) fn set_myself(&self, myself: SelfIdentity) {
        info!(user_id = %myself.id, name = %myself.name, "Identity established");
        *self.inner.myself.write() = myself;
    }

    pub fn directory(&self) -> &Directory {
        &self.inner.directory
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn client(&self) -> &Arc<dyn ChatClient> {
        &self.inner.client
    }

    /// Deserialize a plugin-owned configuration section.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T, BotError> {
        self.inner.settings.section(key)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop the sender loop and every managed worker.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Requests waiting in the outgoing queue.
    pub fn pending_sends(&self) -> usize {
        let outbox = &self.inner.outbox;
        outbox.max_capacity() - outbox.available()
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("myself", &*self.inner.myself.read())
            .field("pending", &self.inner.queues.pending())
            .finish()
    }
}
