//! Listener Registry
//!
//! Producers (handlers, managed workers, plugins) only touch
//! [`RegistryQueues`]: a mutex-guarded pending-add queue and pending-remove
//! queue. The active set itself lives in [`Registry`], owned by the
//! dispatcher and mutated only between events.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::listener::ListenerHandle;
use crate::infrastructure::metrics;

#[derive(Default)]
struct Pending {
    adds: VecDeque<ListenerHandle>,
    removes: Vec<Uuid>,
}

/// Shared pending-add / pending-remove queues. Cheap to clone.
#[derive(Clone, Default)]
pub struct RegistryQueues {
    inner: Arc<Mutex<Pending>>,
}

impl RegistryQueues {
    pub(crate) fn push_add(&self, handle: ListenerHandle) {
        self.inner.lock().adds.push_back(handle);
    }

    pub(crate) fn push_remove(&self, id: Uuid) {
        self.inner.lock().removes.push(id);
    }

    pub(crate) fn take_adds(&self) -> VecDeque<ListenerHandle> {
        std::mem::take(&mut self.inner.lock().adds)
    }

    pub(crate) fn take_removals(&self) -> Vec<Uuid> {
        std::mem::take(&mut self.inner.lock().removes)
    }

    /// Requests not yet applied, as `(adds, removes)`.
    pub fn pending(&self) -> (usize, usize) {
        let pending = self.inner.lock();
        (pending.adds.len(), pending.removes.len())
    }
}

/// The active listener set, in registration order.
#[derive(Default)]
pub struct Registry {
    queues: RegistryQueues,
    active: Vec<ListenerHandle>,
}

impl Registry {
    pub fn new(queues: RegistryQueues) -> Self {
        Self {
            queues,
            active: Vec::new(),
        }
    }

    /// Move pending additions into the active set.
    ///
    /// Listeners closed while still pending are dropped here and never
    /// become active.
    pub fn merge_pending(&mut self) -> usize {
        let mut merged = 0;
        for handle in self.queues.take_adds() {
            if handle.activate() {
                self.active.push(handle);
                merged += 1;
            } else {
                debug!(listener_id = %handle.id(), "Listener closed before activation");
                handle.mark_removed();
            }
        }
        if merged > 0 {
            metrics::set_listeners_active(self.active.len());
        }
        merged
    }

    /// Apply every pending removal. Unknown IDs are ignored.
    pub fn drain_removals(&mut self) -> usize {
        let removals = self.queues.take_removals();
        if removals.is_empty() {
            return 0;
        }
        let removals: HashSet<Uuid> = removals.into_iter().collect();
        let before = self.active.len();
        self.active.retain(|handle| {
            if removals.contains(&handle.id()) {
                handle.mark_removed();
                false
            } else {
                true
            }
        });
        let removed = before - self.active.len();
        if removed > 0 {
            debug!(removed, remaining = self.active.len(), "Listeners removed");
            metrics::set_listeners_active(self.active.len());
        }
        removed
    }

    pub fn active(&self) -> &[ListenerHandle] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn queues(&self) -> &RegistryQueues {
        &self.queues
    }
}
