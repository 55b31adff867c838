//! Outgoing Reply Channel
//!
//! A bounded FIFO of outbound requests, drained by a single paced
//! [`SenderLoop`]. Producers (the dispatch loop, listener handlers, managed
//! listener workers) either get an immediate `QueueFull` from
//! [`Outbox::try_enqueue`] or wait for room with [`Outbox::enqueue`]; the
//! queue never grows past its capacity.
//!
//! Every request carries a `watch` channel on which the sender loop publishes
//! the outcome, observed through [`Delivery`].

mod sender;

pub use sender::SenderLoop;

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::domain::{MessageTs, ReactionItem, SentMessage};
use crate::infrastructure::metrics;
use crate::shared::error::BotError;

/// Where an outgoing message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A conversation ID
    Channel(String),
    /// A user ID; the sender loop resolves (or opens) the direct conversation
    User(String),
}

/// One unit of outbound work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    Message {
        destination: Destination,
        text: String,
        thread_ts: Option<MessageTs>,
    },
    AddReaction {
        emoji: String,
        item: ReactionItem,
    },
    RemoveReaction {
        emoji: String,
        item: ReactionItem,
    },
}

impl OutboundAction {
    pub fn message(destination: Destination, text: impl Into<String>) -> Self {
        Self::Message {
            destination,
            text: text.into(),
            thread_ts: None,
        }
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::AddReaction { .. } => "add_reaction",
            Self::RemoveReaction { .. } => "remove_reaction",
        }
    }
}

/// Outcome of an outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Queued or in flight
    Pending,
    /// Performed; for messages, the posted message
    Sent(Option<SentMessage>),
    /// Given up on
    Failed(String),
}

/// A queued request, as consumed by the sender loop.
#[derive(Debug)]
pub struct OutboundRequest {
    pub id: Uuid,
    pub action: OutboundAction,
    status: watch::Sender<DeliveryStatus>,
}

impl OutboundRequest {
    fn new(action: OutboundAction) -> (Self, Delivery) {
        let id = Uuid::new_v4();
        let (status, rx) = watch::channel(DeliveryStatus::Pending);
        (Self { id, action, status }, Delivery { id, rx })
    }

    /// Publish the final outcome to every observer.
    pub fn complete(&self, status: DeliveryStatus) {
        self.status.send_replace(status);
    }
}

/// Observer for the outcome of one outbound request.
#[derive(Debug, Clone)]
pub struct Delivery {
    id: Uuid,
    rx: watch::Receiver<DeliveryStatus>,
}

impl Delivery {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The outcome so far.
    pub fn status(&self) -> DeliveryStatus {
        self.rx.borrow().clone()
    }

    /// Wait up to `timeout` for the request to be performed.
    pub async fn wait(&self, timeout: Duration) -> Result<Option<SentMessage>, BotError> {
        let mut rx = self.rx.clone();
        let status = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| !matches!(s, DeliveryStatus::Pending)),
        )
        .await
        .map_err(|_| BotError::DeliveryTimeout)?
        .map_err(|_| BotError::QueueClosed)?
        .clone();

        match status {
            DeliveryStatus::Sent(sent) => Ok(sent),
            DeliveryStatus::Failed(reason) => Err(BotError::DeliveryFailed(reason)),
            DeliveryStatus::Pending => Err(BotError::DeliveryTimeout),
        }
    }
}

/// Producer side of the outgoing queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundRequest>,
}

impl Outbox {
    /// Create a queue holding at most `capacity` pending requests.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting; fails with `QueueFull` when at capacity.
    pub fn try_enqueue(&self, action: OutboundAction) -> Result<Delivery, BotError> {
        let label = action.label();
        let (request, delivery) = OutboundRequest::new(action);
        match self.tx.try_send(request) {
            Ok(()) => Ok(delivery),
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_outbound(label, "rejected");
                Err(BotError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(BotError::QueueClosed),
        }
    }

    /// Enqueue, waiting for room when the queue is full.
    pub async fn enqueue(&self, action: OutboundAction) -> Result<Delivery, BotError> {
        let (request, delivery) = OutboundRequest::new(action);
        self.tx
            .send(request)
            .await
            .map_err(|_| BotError::QueueClosed)?;
        Ok(delivery)
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}
