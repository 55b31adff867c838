//! Listeners
//!
//! A [`Listener`] is a filter plus handlers. Registering it with
//! [`Bot::listen`](crate::application::Bot::listen) yields a
//! [`ListenerHandle`] tracking its lifecycle:
//!
//! ```text
//! Pending --(merged at the start of the next dispatch cycle)--> Active
//!    |                                                            |
//!    +------------------(close / timeout)------------------> Closing
//!                                                                 |
//!                            (removal drained by the dispatcher)  v
//!                                                              Removed
//! ```
//!
//! A listener declaring `listen_duration` or `listen_until` is managed: a
//! worker task owns its deadline and is the only party that files its
//! removal request.

mod filter;
mod handle;
pub(crate) mod managed;

pub use filter::{Captures, MessageFilter};
pub use handle::{ListenerHandle, ListenerState};

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::Bot;
use crate::domain::{Event, Message};
use crate::infrastructure::metrics;
use crate::shared::error::BotError;

/// What a generic event handler receives: the normalized message when the
/// event carried one, otherwise the event itself.
#[derive(Debug, Clone, Copy)]
pub enum Incoming<'a> {
    Message(&'a Message),
    Event(&'a Event),
}

impl<'a> Incoming<'a> {
    pub fn message(&self) -> Option<&'a Message> {
        match self {
            Incoming::Message(msg) => Some(msg),
            Incoming::Event(_) => None,
        }
    }

    pub fn event(&self) -> Option<&'a Event> {
        match self {
            Incoming::Event(event) => Some(event),
            Incoming::Message(_) => None,
        }
    }
}

/// Passed to every handler invocation.
pub struct HandlerContext<'a> {
    pub bot: &'a Bot,
    pub listener: &'a ListenerHandle,
}

pub type MessageHandler =
    Arc<dyn Fn(&HandlerContext<'_>, &Message) -> anyhow::Result<()> + Send + Sync>;
pub type EventHandler =
    Arc<dyn Fn(&HandlerContext<'_>, Incoming<'_>) -> anyhow::Result<()> + Send + Sync>;
pub type TimeoutHandler = Arc<dyn Fn(&HandlerContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// A listener definition, built fluently and handed to `Bot::listen`.
#[derive(Clone, Default)]
pub struct Listener {
    pub(crate) filter: MessageFilter,
    pub(crate) message_handler: Option<MessageHandler>,
    pub(crate) event_handler: Option<EventHandler>,
    pub(crate) timeout_handler: Option<TimeoutHandler>,
    pub(crate) listen_duration: Option<Duration>,
    pub(crate) listen_until: Option<Instant>,
}

impl Listener {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Filter
    // ========================================================================

    /// Only messages addressing the bot (direct conversation or mention).
    pub fn mentions_me_only(mut self) -> Self {
        self.filter.mentions_me_only = true;
        self
    }

    pub fn private_only(mut self) -> Self {
        self.filter.private_only = true;
        self
    }

    pub fn public_only(mut self) -> Self {
        self.filter.public_only = true;
        self
    }

    /// Also deliver edited messages.
    pub fn listen_for_edits(mut self) -> Self {
        self.filter.listen_for_edits = true;
        self
    }

    /// Also deliver messages the bot posted itself.
    pub fn match_my_messages(mut self) -> Self {
        self.filter.match_my_messages = true;
        self
    }

    pub fn contains(mut self, needle: impl Into<String>) -> Self {
        self.filter.contains = Some(needle.into());
        self
    }

    pub fn contains_any<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.contains_any = needles.into_iter().map(Into::into).collect();
        self
    }

    pub fn contains_any_cased<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.contains_any_cased = needles.into_iter().map(Into::into).collect();
        self
    }

    /// Require `pattern` to match; capture groups land in `Message::matches`.
    pub fn matches(mut self, pattern: Regex) -> Self {
        self.filter.matches = Some(pattern);
        self
    }

    pub fn from_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.from_users = Some(users.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.from_channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Handler for messages passing the filter.
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerContext<'_>, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.message_handler = Some(Arc::new(handler));
        self
    }

    /// Unfiltered handler for every event.
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerContext<'_>, Incoming<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.event_handler = Some(Arc::new(handler));
        self
    }

    /// Runs once when a managed listener's deadline passes.
    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.timeout_handler = Some(Arc::new(handler));
        self
    }

    // ========================================================================
    // Lifetime
    // ========================================================================

    /// Close automatically after `duration` (resettable).
    pub fn listen_duration(mut self, duration: Duration) -> Self {
        self.listen_duration = Some(duration);
        self
    }

    /// Close automatically at `deadline`.
    pub fn listen_until(mut self, deadline: Instant) -> Self {
        self.listen_until = Some(deadline);
        self
    }

    pub fn is_managed(&self) -> bool {
        self.listen_duration.is_some() || self.listen_until.is_some()
    }

    /// The first deadline of a managed listener, measured from `now`.
    pub(crate) fn deadline(&self, now: Instant) -> Option<Instant> {
        let by_duration = self.listen_duration.map(|d| now + d);
        match (by_duration, self.listen_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    /// Reject definitions that could never be dispatched sensibly.
    pub fn validate(&self) -> Result<(), BotError> {
        if self.message_handler.is_none() && self.event_handler.is_none() {
            return Err(BotError::InvalidListener(
                "a message handler or an event handler is required".into(),
            ));
        }
        if let Some(reason) = self.filter.contradiction() {
            return Err(BotError::InvalidListener(reason.into()));
        }
        if self.timeout_handler.is_some() && !self.is_managed() {
            return Err(BotError::InvalidListener(
                "a timeout handler needs listen_duration or listen_until".into(),
            ));
        }
        if self.listen_duration == Some(Duration::ZERO) {
            return Err(BotError::InvalidListener(
                "listen_duration must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("filter", &self.filter)
            .field("message_handler", &self.message_handler.is_some())
            .field("event_handler", &self.event_handler.is_some())
            .field("timeout_handler", &self.timeout_handler.is_some())
            .field("listen_duration", &self.listen_duration)
            .field("listen_until", &self.listen_until)
            .finish()
    }
}

/// Run one handler invocation, containing errors and panics.
///
/// Returns `false` when the handler failed.
pub(crate) fn guarded<F>(listener_id: Uuid, handler: &'static str, f: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            metrics::record_handler_failure("error");
            warn!(listener_id = %listener_id, handler, error = %e, "Listener handler failed");
            false
        }
        Err(panic) => {
            metrics::record_handler_failure("panic");
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            error!(listener_id = %listener_id, handler, panic = %reason, "Listener handler panicked");
            false
        }
    }
}
