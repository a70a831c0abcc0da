//! Observer capability and the stock observers.
//!
//! An [`Observer`] receives every [`ChangeEvent`] published on the channels it
//! is subscribed to, subject to its [`Interests`]. Observers are shared as
//! `Arc<dyn Observer>`; the `Arc` identity is what subscription dedups on.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::Value;
use crate::event::ChangeEvent;
use crate::hash::FastIndexMap;

/// Predicate over a single event attribute
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Per-observer filter: attribute name -> predicate.
///
/// An empty map means "everything". Otherwise an event is delivered iff at
/// least one attribute it carries has an entry here whose predicate accepts
/// the attribute's value. The first accepting entry short-circuits.
#[derive(Clone, Default)]
pub struct Interests {
    predicates: FastIndexMap<String, Predicate>,
}

impl Interests {
    /// Interested in every event
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    ///
    /// ```ignore
    /// let even_only = Interests::new().with("newValue", |v| v.as_int().is_some_and(|n| n % 2 == 0));
    /// ```
    pub fn with<F>(mut self, attribute: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.insert(attribute, predicate);
        self
    }

    /// Add or replace the predicate for an attribute
    pub fn insert<F>(&mut self, attribute: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(attribute.into(), Arc::new(predicate));
    }

    /// Drop the predicate for an attribute
    pub fn remove(&mut self, attribute: &str) -> bool {
        self.predicates.shift_remove(attribute).is_some()
    }

    /// True when no filter is installed
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Number of filtered attributes
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Decide whether `event` should be delivered.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if self.predicates.is_empty() {
            return true;
        }
        for (name, value) in event.attributes() {
            if let Some(predicate) = self.predicates.get(name) {
                if predicate(&value) {
                    return true;
                }
            }
        }
        cov_mark::hit!(observer_not_interested);
        false
    }
}

impl fmt::Debug for Interests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.predicates.keys()).finish()
    }
}

/// Receives change events.
///
/// `receive` has no default: an observer that does not handle events does not
/// compile.
pub trait Observer: Send + Sync {
    /// Called synchronously once per published event this observer is
    /// interested in.
    fn receive(&self, event: &ChangeEvent);

    /// Filter consulted before every delivery. Defaults to "everything".
    fn interests(&self) -> Interests {
        Interests::default()
    }
}

/// Observer that records every event it receives.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ChangeEvent>>,
    interests: RwLock<Interests>,
}

impl RecordingObserver {
    /// Empty recorder, interested in everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty recorder with the given filter
    pub fn with_interests(interests: Interests) -> Self {
        Self {
            events: Mutex::default(),
            interests: RwLock::new(interests),
        }
    }

    /// Replace the filter
    pub fn set_interests(&self, interests: Interests) {
        *self.interests.write() = interests;
    }

    /// Number of events received
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Copy of the received events, oldest first
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    /// Most recent event
    pub fn last(&self) -> Option<ChangeEvent> {
        self.events.lock().last().cloned()
    }

    /// Forget everything received so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Observer for RecordingObserver {
    fn receive(&self, event: &ChangeEvent) {
        self.events.lock().push(event.clone());
    }

    fn interests(&self) -> Interests {
        self.interests.read().clone()
    }
}

impl fmt::Debug for RecordingObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingObserver")
            .field("events", &self.count())
            .field("interests", &*self.interests.read())
            .finish()
    }
}

type Sink = Box<dyn Fn(&str) + Send + Sync>;

/// Observer that renders each event as one line of text.
///
/// By default lines go to `tracing` at info level; [`with_sink`](Self::with_sink)
/// redirects them anywhere else.
pub struct OutputObserver {
    sink: Sink,
    interests: Interests,
}

impl OutputObserver {
    /// Log every event via `tracing`
    pub fn new() -> Self {
        Self::with_sink(|line| tracing::info!(target: "responsive::output", "{line}"))
    }

    /// Hand every rendered event to `sink`
    pub fn with_sink<F>(sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            sink: Box::new(sink),
            interests: Interests::default(),
        }
    }

    /// Restrict which events are rendered
    pub fn filtered(mut self, interests: Interests) -> Self {
        self.interests = interests;
        self
    }
}

impl Default for OutputObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for OutputObserver {
    fn receive(&self, event: &ChangeEvent) {
        (self.sink)(&event.to_string());
    }

    fn interests(&self) -> Interests {
        self.interests.clone()
    }
}

/// Observer that ignores everything. Useful as a baseline when measuring
/// notification overhead.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoNothingObserver;

impl Observer for DoNothingObserver {
    fn receive(&self, _event: &ChangeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{SourceId, attr};

    fn added(value: i64) -> ChangeEvent {
        ChangeEvent::element_added(SourceId::new(1), Value::Int(value))
    }

    fn is_even(value: &Value) -> bool {
        value.as_int().is_some_and(|n| n % 2 == 0)
    }

    #[test]
    fn empty_interests_match_everything() {
        assert!(Interests::new().matches(&added(3)));
    }

    #[test]
    fn interest_predicate_filters_by_attribute_value() {
        let interests = Interests::new().with(attr::NEW_VALUE, is_even);

        assert!(interests.matches(&added(2)));
        assert!(!interests.matches(&added(3)));
    }

    #[test]
    fn interest_on_absent_attribute_never_matches() {
        cov_mark::check!(observer_not_interested);
        let interests = Interests::new().with(attr::KEY, |_| true);

        assert!(!interests.matches(&added(2)));
    }

    #[test]
    fn any_accepting_interest_is_enough() {
        let interests = Interests::new()
            .with(attr::NEW_VALUE, is_even)
            .with(attr::OPERATION, |op| *op == Value::from("VALUE_ADDED"));

        assert!(interests.matches(&added(3)));
    }

    #[test]
    fn recording_observer_records_and_clears() {
        let observer = RecordingObserver::new();
        observer.receive(&added(1));
        observer.receive(&added(2));

        assert_eq!(observer.count(), 2);
        assert_eq!(observer.last(), Some(added(2)));

        observer.clear();
        assert_eq!(observer.count(), 0);
        assert!(observer.last().is_none());
    }

    #[test]
    fn output_observer_renders_event() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let observer = OutputObserver::with_sink(move |line| captured.lock().push(line.to_owned()));

        observer.receive(&added(6));

        let lines = lines.lock();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("VALUE_ADDED"));
        assert!(lines[0].contains("new=6"));
    }
}
