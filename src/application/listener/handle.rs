//! Listener lifecycle handle.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::Listener;
use crate::application::registry::RegistryQueues;

/// Lifecycle state of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ListenerState {
    /// Queued, not yet merged into the active set
    Pending = 0,
    /// Eligible for fan-out
    Active = 1,
    /// Removal requested; never dispatched again
    Closing = 2,
    /// Gone from the registry
    Removed = 3,
}

impl ListenerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Removed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Control channel between a handle and its managed worker.
pub(crate) struct ManagedControl {
    pub(crate) cancel: CancellationToken,
    pub(crate) deadline: watch::Sender<Instant>,
}

struct Shared {
    id: Uuid,
    state: AtomicU8,
    definition: Listener,
    managed: Option<ManagedControl>,
    queues: RegistryQueues,
}

/// Handle to a registered listener. Cheap to clone.
#[derive(Clone)]
pub struct ListenerHandle {
    shared: Arc<Shared>,
}

impl ListenerHandle {
    pub(crate) fn new(
        definition: Listener,
        managed: Option<ManagedControl>,
        queues: RegistryQueues,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                state: AtomicU8::new(ListenerState::Pending as u8),
                definition,
                managed,
                queues,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == ListenerState::Active
    }

    /// Closing or already removed.
    pub fn is_closed(&self) -> bool {
        self.state() >= ListenerState::Closing
    }

    pub fn is_managed(&self) -> bool {
        self.shared.managed.is_some()
    }

    pub(crate) fn definition(&self) -> &Listener {
        &self.shared.definition
    }

    /// Request removal. Idempotent.
    ///
    /// The listener stops receiving events immediately, including the rest
    /// of the event being dispatched when called from a handler.
    pub fn close(&self) {
        if !self.begin_close() {
            return;
        }
        match &self.shared.managed {
            // The worker files the removal request once it observes this.
            Some(control) => control.cancel.cancel(),
            None => self.request_removal(),
        }
    }

    /// Push the deadline of a managed listener back to `listen_duration` from
    /// now. No-op for unmanaged listeners or those without a duration.
    pub fn reset_duration(&self) {
        if let Some(duration) = self.shared.definition.listen_duration {
            self.reset_new_duration(duration);
        } else {
            debug!(listener_id = %self.id(), "reset_duration without listen_duration ignored");
        }
    }

    /// Move the deadline of a managed listener to `duration` from now.
    pub fn reset_new_duration(&self, duration: Duration) {
        if self.is_closed() {
            return;
        }
        if let Some(control) = &self.shared.managed {
            control.deadline.send_replace(Instant::now() + duration);
        }
    }

    /// Pending -> Active. Fails if the listener was closed meanwhile.
    pub(crate) fn activate(&self) -> bool {
        self.shared
            .state
            .compare_exchange(
                ListenerState::Pending as u8,
                ListenerState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Pending/Active -> Closing. Returns `false` if already closing or removed.
    pub(crate) fn begin_close(&self) -> bool {
        let mut current = self.shared.state.load(Ordering::Acquire);
        loop {
            if current >= ListenerState::Closing as u8 {
                return false;
            }
            match self.shared.state.compare_exchange(
                current,
                ListenerState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn mark_removed(&self) {
        self.shared
            .state
            .store(ListenerState::Removed as u8, Ordering::Release);
    }

    /// Enqueue the removal request for the dispatcher.
    pub(crate) fn request_removal(&self) {
        self.shared.queues.push_remove(self.id());
    }
}

impl PartialEq for ListenerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ListenerHandle {}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("managed", &self.is_managed())
            .finish()
    }
}
