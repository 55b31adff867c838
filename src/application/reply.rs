//! Reply handle.

use uuid::Uuid;

use super::bot::Bot;
use super::listener::ListenerHandle;
use super::reaction::ReactionListener;
use crate::domain::{ReactionItem, ReactionTarget, SentMessage};
use crate::infrastructure::outbox::{Delivery, DeliveryStatus, Destination, OutboundAction};
use crate::shared::error::BotError;

/// Correlates a queued message with its destination and, once the sender
/// loop has posted it, with the posted message.
#[derive(Debug, Clone)]
pub struct Reply {
    bot: Bot,
    destination: Destination,
    delivery: Delivery,
}

impl Reply {
    pub(crate) fn new(bot: Bot, destination: Destination, delivery: Delivery) -> Self {
        Self {
            bot,
            destination,
            delivery,
        }
    }

    pub fn id(&self) -> Uuid {
        self.delivery.id()
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn status(&self) -> DeliveryStatus {
        self.delivery.status()
    }

    /// Wait for the sender loop, bounded by the configured ack timeout.
    pub async fn delivered(&self) -> Result<SentMessage, BotError> {
        let timeout = self.bot.settings().dispatch.ack_timeout();
        self.delivery
            .wait(timeout)
            .await?
            .ok_or_else(|| BotError::DeliveryFailed("no message was posted".into()))
    }

    /// Bind a reaction overlay to the posted message.
    pub async fn listen_reaction(
        &self,
        overlay: ReactionListener,
    ) -> Result<ListenerHandle, BotError> {
        let sent = self.delivered().await?;
        self.bot
            .listen_reaction(ReactionTarget::Message(sent.ts), overlay)
    }

    /// React to the posted message.
    pub async fn add_reaction(&self, emoji: &str) -> Result<Delivery, BotError> {
        let sent = self.delivered().await?;
        self.bot.react(OutboundAction::AddReaction {
            emoji: emoji.trim_matches(':').to_string(),
            item: ReactionItem::message(sent.channel, sent.ts),
        })
    }
}
