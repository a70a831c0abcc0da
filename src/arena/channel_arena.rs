// Channel arena - storage for notification channel metadata
//
// This module defines ChannelMetadata, ChannelId, and provides helper functions
// for working with the channel arena.
//
// OWNERSHIP MODEL:
// - Subject = owns exactly one arena slot and frees it on Drop
// - Wrappers own a Subject; nested wrappers reach the root channel only
//   through a ChannelId (Copy), never through a strong reference
// - Slab slots are reused, so every ChannelId also carries the serial of the
//   channel it was issued for. A lookup whose serial does not match the slot's
//   current occupant is stale and returns None.

use crate::event::{ChangeEvent, SourceId};
use crate::hash::FastIndexMap;
use crate::observer::Observer;
use crate::subject::Delivery;
use parking_lot::RwLock;
use slab::Slab;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global channel arena - stores all channel metadata
static CHANNEL_ARENA: RwLock<Slab<ChannelMetadata>> = RwLock::new(Slab::new());

/// Serial numbers handed out to channels; never reused.
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Observer set keyed by the observer's `Arc` data pointer.
type ObserverSet = FastIndexMap<usize, Arc<dyn Observer>>;

/// Identity of an observer: the address of its `Arc` allocation.
pub(crate) fn observer_key<O: Observer + ?Sized>(observer: &Arc<O>) -> usize {
    Arc::as_ptr(observer) as *const () as usize
}

/// Identifier for a notification channel in the arena.
///
/// Pairs a slab index with the serial of the channel that occupied the slot
/// when the id was issued. The serial is the wrapper's public [`SourceId`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ChannelId {
    slot: usize,
    serial: SourceId,
}

impl ChannelId {
    /// Convert to usize for slab indexing
    pub(crate) fn index(self) -> usize {
        self.slot
    }

    /// Public identity of the channel
    pub fn source_id(self) -> SourceId {
        self.serial
    }

    /// Access the channel metadata with a closure (read-only)
    ///
    /// Returns None if the channel has been removed (stale access).
    pub(crate) fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&ChannelMetadata) -> R,
    {
        let arena = CHANNEL_ARENA.read();
        arena
            .get(self.index())
            .filter(|metadata| metadata.serial == self.serial)
            .map(f)
    }

    /// Whether the channel still exists
    pub fn is_live(self) -> bool {
        self.with(|_| ()).is_some()
    }

    /// Add an observer; a second add of the same `Arc` is a no-op.
    ///
    /// Returns true if the observer was newly added.
    pub fn add_observer(self, observer: Arc<dyn Observer>) -> bool {
        self.with(|metadata| {
            let mut observers = metadata.observers.write();
            let key = observer_key(&observer);
            if observers.contains_key(&key) {
                return false;
            }
            observers.insert(key, observer);
            true
        })
        .unwrap_or(false)
    }

    /// Remove an observer by identity
    ///
    /// Returns false if it was not subscribed.
    pub fn remove_observer<O: Observer + ?Sized>(self, observer: &Arc<O>) -> bool {
        // The removed Arc may be the last one; drop it after the arena lock is
        // released, since dropping an observer can drop a Subject.
        let removed = self
            .with(|metadata| metadata.observers.write().shift_remove(&observer_key(observer)))
            .flatten();
        removed.is_some()
    }

    /// Number of subscribed observers (0 for a stale id)
    pub fn observer_count(self) -> usize {
        self.with(|metadata| metadata.observers.read().len())
            .unwrap_or(0)
    }

    /// Delivery policy configured for this channel
    pub fn delivery(self) -> Delivery {
        self.with(|metadata| metadata.delivery)
            .unwrap_or_default()
    }

    /// Broadcast an event to every interested observer, in subscription order.
    ///
    /// The observer list is copied out under the read lock and the lock is
    /// released before delivery, so observers may subscribe, unsubscribe or
    /// publish from inside `receive`.
    ///
    /// Returns the number of observers the event was delivered to, or None if
    /// the channel is stale.
    pub fn publish(self, event: &ChangeEvent) -> Option<usize> {
        let (observers, delivery) = self.with(|metadata| {
            let observers: Vec<_> = metadata.observers.read().values().cloned().collect();
            (observers, metadata.delivery)
        })?;

        tracing::trace!(
            channel = %self.serial,
            source = %event.source_id,
            operation = %event.operation,
            observers = observers.len(),
            "publishing change event"
        );

        let mut delivered = 0;
        for observer in &observers {
            if !observer.interests().matches(event) {
                continue;
            }
            delivered += 1;
            match delivery {
                Delivery::Propagate => observer.receive(event),
                Delivery::Isolate => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.receive(event)));
                    if let Err(payload) = outcome {
                        cov_mark::hit!(isolated_observer_panic);
                        tracing::error!(
                            channel = %self.serial,
                            source = %event.source_id,
                            panic = panic_message(payload.as_ref()),
                            "observer panicked while receiving change event"
                        );
                    }
                }
            }
        }
        Some(delivered)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

/// Metadata for a channel stored in the arena.
///
/// Holds the observer set and the delivery policy. The values being observed
/// live outside the arena, in the wrappers.
pub struct ChannelMetadata {
    serial: SourceId,
    /// Subscribed observers, in subscription order.
    pub(crate) observers: RwLock<ObserverSet>,
    delivery: Delivery,
}

impl ChannelMetadata {
    /// Create channel metadata with a fresh serial and no observers
    pub fn new(delivery: Delivery) -> Self {
        let serial = SourceId::new(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed));
        Self {
            serial,
            observers: RwLock::new(ObserverSet::default()),
            delivery,
        }
    }
}

impl std::fmt::Debug for ChannelMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMetadata")
            .field("serial", &self.serial)
            .field("observers", &self.observers.read().len())
            .field("delivery", &self.delivery)
            .finish()
    }
}

/// Insert a channel into the arena and return its ID
pub fn channel_arena_insert(metadata: ChannelMetadata) -> ChannelId {
    let serial = metadata.serial;
    let mut arena = CHANNEL_ARENA.write();
    let entry = arena.vacant_entry();
    let key = entry.key();
    entry.insert(metadata);
    ChannelId {
        slot: key,
        serial,
    }
}

/// Remove a channel from the arena
pub fn channel_arena_remove(id: ChannelId) -> Option<ChannelMetadata> {
    let mut arena = CHANNEL_ARENA.write();
    match arena.get(id.index()) {
        Some(metadata) if metadata.serial == id.serial => Some(arena.remove(id.index())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeEvent;
    use crate::observer::RecordingObserver;

    #[test]
    fn stale_access_returns_none() {
        let id = channel_arena_insert(ChannelMetadata::new(Delivery::default()));

        channel_arena_remove(id);

        assert!(!id.is_live());
        assert!(id.publish(&ChangeEvent::sequence_replaced(id.source_id())).is_none());
        assert_eq!(id.observer_count(), 0);
    }

    #[test]
    fn reused_slot_does_not_resurrect_old_id() {
        let old = channel_arena_insert(ChannelMetadata::new(Delivery::default()));
        channel_arena_remove(old);

        // Other tests share the arena, so the slot may or may not be reused;
        // either way the old id must stay stale.
        let new = channel_arena_insert(ChannelMetadata::new(Delivery::default()));
        assert!(!old.is_live());
        assert!(new.is_live());
        assert_ne!(old.source_id(), new.source_id());
        assert!(channel_arena_remove(old).is_none());

        channel_arena_remove(new);
    }

    #[test]
    fn observer_dedup_is_by_identity() {
        let id = channel_arena_insert(ChannelMetadata::new(Delivery::default()));
        let observer: Arc<dyn Observer> = Arc::new(RecordingObserver::new());
        let twin: Arc<dyn Observer> = Arc::new(RecordingObserver::new());

        assert!(id.add_observer(observer.clone()));
        assert!(!id.add_observer(observer.clone()));
        assert!(id.add_observer(twin));
        assert_eq!(id.observer_count(), 2);

        assert!(id.remove_observer(&observer));
        assert!(!id.remove_observer(&observer));
        assert_eq!(id.observer_count(), 1);

        channel_arena_remove(id);
    }
}
