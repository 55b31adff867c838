//! The single paced sender loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{DeliveryStatus, Destination, OutboundAction, OutboundRequest};
use crate::domain::{ChatClient, ClientError, ConversationKind, DirectoryChange, OutgoingMessage};
use crate::infrastructure::cache::Directory;
use crate::infrastructure::metrics;
use crate::shared::RetryPolicy;

/// Drains the outgoing queue one request at a time.
///
/// After each request the loop sleeps for `interval` before taking the next,
/// which caps the outbound rate.
pub struct SenderLoop {
    rx: mpsc::Receiver<OutboundRequest>,
    client: Arc<dyn ChatClient>,
    directory: Directory,
    interval: Duration,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

impl SenderLoop {
    pub fn new(
        rx: mpsc::Receiver<OutboundRequest>,
        client: Arc<dyn ChatClient>,
        directory: Directory,
        interval: Duration,
        retry: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            client,
            directory,
            interval,
            retry,
            shutdown,
        }
    }

    /// Run until every producer is gone or shutdown is requested.
    pub async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Sender loop started");
        loop {
            let request = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            self.process(&request).await;

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Sender loop stopped");
    }

    #[instrument(skip(self, request), fields(request_id = %request.id, action = request.action.label()))]
    async fn process(&self, request: &OutboundRequest) {
        let label = request.action.label();
        let status = match self.perform(&request.action).await {
            Ok(status) => {
                metrics::record_outbound(label, "sent");
                status
            }
            Err(e) => {
                metrics::record_outbound(label, "failed");
                error!(error = %e, "Outbound request failed");
                DeliveryStatus::Failed(e.to_string())
            }
        };
        request.complete(status);
    }

    async fn perform(&self, action: &OutboundAction) -> Result<DeliveryStatus, ClientError> {
        let client = self.client.as_ref();
        match action {
            OutboundAction::Message {
                destination,
                text,
                thread_ts,
            } => {
                let channel = self.resolve(destination).await?;
                let message = OutgoingMessage {
                    channel,
                    text: text.clone(),
                    thread_ts: thread_ts.clone(),
                };
                let message = &message;
                let sent = self
                    .retry
                    .run("send_message", move || client.send_message(message))
                    .await?;
                debug!(channel = %sent.channel, ts = %sent.ts, "Message sent");
                Ok(DeliveryStatus::Sent(Some(sent)))
            }
            OutboundAction::AddReaction { emoji, item } => {
                self.retry
                    .run("add_reaction", move || client.add_reaction(emoji, item))
                    .await?;
                Ok(DeliveryStatus::Sent(None))
            }
            OutboundAction::RemoveReaction { emoji, item } => {
                self.retry
                    .run("remove_reaction", move || client.remove_reaction(emoji, item))
                    .await?;
                Ok(DeliveryStatus::Sent(None))
            }
        }
    }

    /// Conversation ID for a destination, opening a direct conversation when
    /// none is cached for a user.
    async fn resolve(&self, destination: &Destination) -> Result<String, ClientError> {
        match destination {
            Destination::Channel(id) => Ok(id.clone()),
            Destination::User(user_id) => {
                if let Some(im) = self.directory.im_channel_with(user_id) {
                    return Ok(im.id);
                }

                let client = self.client.as_ref();
                let user = user_id.as_str();
                let id = self
                    .retry
                    .run("open_im", move || client.open_im(user))
                    .await?;
                if id.is_empty() {
                    warn!(user_id = %user_id, "Direct conversation could not be opened");
                    return Err(ClientError::Protocol("empty conversation id".into()));
                }

                self.directory.apply(
                    ConversationKind::Im,
                    DirectoryChange::Opened {
                        id: id.clone(),
                        user: user_id.clone(),
                    },
                );
                Ok(id)
            }
        }
    }
}
