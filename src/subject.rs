use std::sync::Arc;

use crate::arena::{ChannelId, ChannelMetadata, channel_arena_insert, channel_arena_remove};
use crate::event::{ChangeEvent, SourceId};
use crate::observer::Observer;

/// What happens when an observer panics during delivery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// The panic unwinds out of the mutating call; later observers are skipped.
    #[default]
    Propagate,
    /// The panic is caught and logged; delivery continues with the next observer.
    Isolate,
}

/// Notification source capability.
///
/// Implemented by [`Subject`] and by both wrapper variants. Everything routes
/// through the channel id, so implementors only provide [`channel_id`](Self::channel_id).
pub trait Publisher {
    /// Arena handle of the channel this publisher owns
    fn channel_id(&self) -> ChannelId;

    /// Stable identity, reported as `sourceId` in events
    fn source_id(&self) -> SourceId {
        self.channel_id().source_id()
    }

    /// Add an observer. Subscribing the same `Arc` twice is a no-op.
    ///
    /// The channel keeps the observer alive until it is unsubscribed or the
    /// channel is dropped. An observer that holds a handle to the structure it
    /// observes therefore keeps that structure alive: neither is freed until
    /// the observer is unsubscribed.
    ///
    /// Returns true if the observer was newly added.
    fn subscribe(&self, observer: Arc<dyn Observer>) -> bool {
        self.channel_id().add_observer(observer)
    }

    /// Remove an observer by identity. Absent observers are ignored.
    ///
    /// Returns true if the observer was subscribed.
    fn unsubscribe<O: Observer + ?Sized>(&self, observer: &Arc<O>) -> bool
    where
        Self: Sized,
    {
        self.channel_id().remove_observer(observer)
    }

    /// Deliver `event` to every interested observer.
    ///
    /// Returns the number of observers it was delivered to.
    fn publish(&self, event: &ChangeEvent) -> usize {
        self.channel_id().publish(event).unwrap_or(0)
    }

    /// Number of subscribed observers
    fn observer_count(&self) -> usize {
        self.channel_id().observer_count()
    }
}

/// Ordered, identity-deduplicated set of observers.
///
/// A `Subject` owns one slot in the channel arena and frees it when dropped.
/// Wrappers own one each; it can also be used standalone.
///
/// # Usage
/// ```ignore
/// let subject = Subject::new();
/// let observer = Arc::new(RecordingObserver::new());
/// subject.subscribe(observer.clone());
/// subject.publish(&ChangeEvent::element_added(subject.source_id(), Value::Int(1)));
/// assert_eq!(observer.count(), 1);
/// ```
pub struct Subject {
    id: ChannelId,
}

impl Subject {
    /// Create a subject that propagates observer panics
    pub fn new() -> Self {
        Self::with_delivery(Delivery::default())
    }

    /// Create a subject with an explicit delivery policy
    pub fn with_delivery(delivery: Delivery) -> Self {
        let id = channel_arena_insert(ChannelMetadata::new(delivery));
        Subject { id }
    }

    /// Delivery policy of this subject
    pub fn delivery(&self) -> Delivery {
        self.id.delivery()
    }
}

impl Publisher for Subject {
    fn channel_id(&self) -> ChannelId {
        self.id
    }
}

impl Drop for Subject {
    fn drop(&mut self) {
        channel_arena_remove(self.id);
    }
}

// NOTE: Subject does not implement Clone. Two owners of one slot would free
// it twice; share the owning wrapper or the ChannelId instead.

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("id", &self.id.source_id())
            .field("observers", &self.id.observer_count())
            .finish()
    }
}

/// Subscriber half of a nested wrapper: republishes everything its child
/// channel emits onto the root channel.
///
/// Holds the root by id only, so a child never keeps its root alive.
pub(crate) struct Forwarder {
    target: ChannelId,
}

impl Forwarder {
    pub(crate) fn new(target: ChannelId) -> Self {
        Self { target }
    }
}

impl Observer for Forwarder {
    fn receive(&self, event: &ChangeEvent) {
        if self.target.publish(event).is_none() {
            tracing::warn!(
                root = %self.target.source_id(),
                source = %event.source_id,
                "root channel is gone, dropping forwarded event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use crate::event::attr;
    use crate::observer::{DoNothingObserver, Interests, RecordingObserver};

    fn event(subject: &Subject, value: i64) -> ChangeEvent {
        ChangeEvent::element_added(subject.source_id(), Value::Int(value))
    }

    #[test]
    fn notify_single_observer() {
        let subject = Subject::new();
        let observer = Arc::new(RecordingObserver::new());
        subject.subscribe(observer.clone());

        assert_eq!(subject.publish(&event(&subject, 1)), 1);
        assert_eq!(observer.count(), 1);
    }

    #[test]
    fn notify_many_observers_in_subscription_order() {
        let subject = Subject::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        struct Tagged(usize, Arc<parking_lot::Mutex<Vec<usize>>>);
        impl Observer for Tagged {
            fn receive(&self, _event: &ChangeEvent) {
                self.1.lock().push(self.0);
            }
        }

        for tag in 0..1000 {
            subject.subscribe(Arc::new(Tagged(tag, order.clone())));
        }
        subject.publish(&event(&subject, 1));

        assert_eq!(*order.lock(), (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_subscription_delivers_once() {
        let subject = Subject::new();
        let observer = Arc::new(RecordingObserver::new());

        assert!(subject.subscribe(observer.clone()));
        assert!(!subject.subscribe(observer.clone()));
        subject.publish(&event(&subject, 1));

        assert_eq!(observer.count(), 1);
        assert_eq!(subject.observer_count(), 1);
    }

    #[test]
    fn unsubscribe_absent_observer_is_noop() {
        let subject = Subject::new();
        let observer = Arc::new(DoNothingObserver);

        assert!(!subject.unsubscribe(&observer));
        subject.subscribe(observer.clone());
        assert!(subject.unsubscribe(&observer));
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn interest_filtering_on_even_values() {
        let subject = Subject::new();
        let observer = Arc::new(RecordingObserver::with_interests(
            Interests::new().with(attr::NEW_VALUE, |v| v.as_int().is_some_and(|n| n % 2 == 0)),
        ));
        subject.subscribe(observer.clone());

        subject.publish(&event(&subject, 2));
        assert_eq!(observer.count(), 1);

        subject.publish(&event(&subject, 3));
        assert_eq!(observer.count(), 1);
    }

    #[test]
    fn propagated_panic_skips_later_observers() {
        struct Exploding;
        impl Observer for Exploding {
            fn receive(&self, _event: &ChangeEvent) {
                panic!("observer failed");
            }
        }

        let subject = Subject::new();
        let after = Arc::new(RecordingObserver::new());
        subject.subscribe(Arc::new(Exploding));
        subject.subscribe(after.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            subject.publish(&event(&subject, 1))
        }));

        assert!(result.is_err());
        assert_eq!(after.count(), 0);
    }

    #[test]
    fn isolated_panic_continues_delivery() {
        cov_mark::check!(isolated_observer_panic);

        struct Exploding;
        impl Observer for Exploding {
            fn receive(&self, _event: &ChangeEvent) {
                panic!("observer failed");
            }
        }

        let subject = Subject::with_delivery(Delivery::Isolate);
        let after = Arc::new(RecordingObserver::new());
        subject.subscribe(Arc::new(Exploding));
        subject.subscribe(after.clone());

        assert_eq!(subject.publish(&event(&subject, 1)), 2);
        assert_eq!(after.count(), 1);
    }

    #[test]
    fn forwarder_republishes_to_target() {
        let root = Subject::new();
        let child = Subject::new();
        let observer = Arc::new(RecordingObserver::new());
        root.subscribe(observer.clone());
        child.subscribe(Arc::new(Forwarder::new(root.channel_id())));

        child.publish(&event(&child, 5));

        let received = observer.last().expect("forwarded event");
        assert_eq!(received.source_id, child.source_id());
    }

    #[test]
    fn forwarder_to_dropped_root_is_silent() {
        let child = Subject::new();
        {
            let root = Subject::new();
            child.subscribe(Arc::new(Forwarder::new(root.channel_id())));
        }

        assert_eq!(child.publish(&event(&child, 5)), 1);
    }
}
