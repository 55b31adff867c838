//! Reaction overlay.
//!
//! A [`ReactionListener`] is turned into an ordinary [`Listener`] whose event
//! handler narrows the event stream down to reactions on one target.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::listener::{HandlerContext, Incoming, Listener, TimeoutHandler};
use crate::domain::{Event, ReactionEvent, ReactionKind, ReactionTarget};
use crate::shared::error::BotError;

pub type ReactionHandler =
    Arc<dyn Fn(&HandlerContext<'_>, &ReactionEvent) -> anyhow::Result<()> + Send + Sync>;

/// Reaction filter plus handler.
#[derive(Clone, Default)]
pub struct ReactionListener {
    emojis: Option<Vec<String>>,
    from_users: Option<Vec<String>>,
    kind: Option<ReactionKind>,
    listen_duration: Option<Duration>,
    timeout_handler: Option<TimeoutHandler>,
    handler: Option<ReactionHandler>,
}

impl ReactionListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only these emoji names (without colons).
    pub fn emojis<I, S>(mut self, emojis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emojis = Some(emojis.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.from_users = Some(users.into_iter().map(Into::into).collect());
        self
    }

    /// Only additions or only removals. Both are delivered by default.
    pub fn only(mut self, kind: ReactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn listen_duration(mut self, duration: Duration) -> Self {
        self.listen_duration = Some(duration);
        self
    }

    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.timeout_handler = Some(Arc::new(handler));
        self
    }

    pub fn on_reaction<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerContext<'_>, &ReactionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// The secondary predicate: emoji set, reacting users and kind.
    pub fn accepts(&self, reaction: &ReactionEvent) -> bool {
        if let Some(kind) = self.kind {
            if reaction.kind != kind {
                return false;
            }
        }
        if let Some(emojis) = &self.emojis {
            if !emojis.iter().any(|e| e.trim_matches(':') == reaction.emoji) {
                return false;
            }
        }
        if let Some(users) = &self.from_users {
            if !users.iter().any(|u| *u == reaction.user) {
                return false;
            }
        }
        true
    }

    /// Build the base listener bound to `target`.
    pub fn into_listener(self, target: ReactionTarget) -> Result<Listener, BotError> {
        let handler = self
            .handler
            .clone()
            .ok_or_else(|| BotError::InvalidListener("a reaction handler is required".into()))?;
        if matches!(&self.emojis, Some(e) if e.is_empty()) {
            return Err(BotError::InvalidListener("empty emoji set".into()));
        }
        if matches!(&self.from_users, Some(u) if u.is_empty()) {
            return Err(BotError::InvalidListener("empty user allow-list".into()));
        }

        let mut listener = Listener::new();
        if let Some(duration) = self.listen_duration {
            listener = listener.listen_duration(duration);
        }
        if let Some(on_timeout) = self.timeout_handler.clone() {
            listener = listener.on_timeout(move |ctx| on_timeout(ctx));
        }

        let overlay = self;
        Ok(listener.on_event(move |ctx, incoming| {
            let Incoming::Event(Event::Reaction(reaction)) = incoming else {
                return Ok(());
            };
            if reaction.user == ctx.bot.myself().id {
                return Ok(());
            }
            if !target.is(&reaction.item) || !overlay.accepts(reaction) {
                return Ok(());
            }
            handler(ctx, reaction)
        }))
    }
}

impl fmt::Debug for ReactionListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionListener")
            .field("emojis", &self.emojis)
            .field("from_users", &self.from_users)
            .field("kind", &self.kind)
            .field("listen_duration", &self.listen_duration)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
