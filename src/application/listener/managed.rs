//! Managed listener workers.
//!
//! Each managed listener gets one tokio task holding a child of the bot's
//! root cancellation token and a permit of a bounded semaphore. The task
//! waits for the first of: cancellation (explicit close or shutdown), the
//! deadline, or a deadline reset. On the way out it is the only writer of
//! the listener's removal request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use super::handle::ManagedControl;
use super::{guarded, HandlerContext, Listener, ListenerHandle};
use crate::application::Bot;
use crate::shared::error::BotError;

/// Resources reserved for one managed listener before it is registered.
pub(crate) struct ManagedSlot {
    permit: OwnedSemaphorePermit,
    cancel: CancellationToken,
    deadline: watch::Receiver<Instant>,
}

/// Bounded pool of managed listener workers.
pub(crate) struct ManagedPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    root: CancellationToken,
    running: Arc<AtomicUsize>,
}

impl ManagedPool {
    pub(crate) fn new(capacity: usize, root: CancellationToken) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            root,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reserve a worker slot for `definition`.
    ///
    /// Fails without side effects when the pool is exhausted or no runtime
    /// is available to run the worker.
    pub(crate) fn prepare(
        &self,
        definition: &Listener,
    ) -> Result<(ManagedControl, ManagedSlot), BotError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(BotError::InvalidListener(
                "managed listeners must be registered from within a tokio runtime".into(),
            ));
        }
        let deadline = definition
            .deadline(Instant::now())
            .ok_or_else(|| BotError::InvalidListener("managed listener without deadline".into()))?;

        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| BotError::ListenerCapacity(self.capacity))?;

        let cancel = self.root.child_token();
        let (tx, rx) = watch::channel(deadline);
        Ok((
            ManagedControl {
                cancel: cancel.clone(),
                deadline: tx,
            },
            ManagedSlot {
                permit,
                cancel,
                deadline: rx,
            },
        ))
    }

    /// Start the worker of a registered managed listener.
    pub(crate) fn spawn(&self, bot: Bot, handle: ListenerHandle, slot: ManagedSlot) {
        let span = tracing::debug_span!("managed_listener", listener_id = %handle.id());
        let running = Arc::clone(&self.running);
        running.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(
            async move {
                run_worker(bot, handle, slot).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
            .instrument(span),
        );
    }

    /// Workers currently running.
    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

async fn run_worker(bot: Bot, handle: ListenerHandle, slot: ManagedSlot) {
    let ManagedSlot {
        permit,
        cancel,
        mut deadline,
    } = slot;

    let mut at = *deadline.borrow_and_update();
    let timed_out = loop {
        tokio::select! {
            _ = cancel.cancelled() => break false,
            _ = tokio::time::sleep_until(at) => break true,
            changed = deadline.changed() => match changed {
                Ok(()) => at = *deadline.borrow_and_update(),
                Err(_) => break false,
            },
        }
    };

    if timed_out {
        debug!("Managed listener timed out");
        if let Some(on_timeout) = handle.definition().timeout_handler.clone() {
            let ctx = HandlerContext {
                bot: &bot,
                listener: &handle,
            };
            guarded(handle.id(), "timeout", || on_timeout(&ctx));
        }
        handle.begin_close();
    } else {
        debug!("Managed listener closed");
    }

    handle.request_removal();
    drop(permit);
}
