use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::arena::ChannelId;
use crate::error::{ResponsiveError, Result};
use crate::event::{ChangeEvent, SourceId};
use crate::factory::{self, RootLink};
use crate::subject::{Delivery, Forwarder, Publisher, Subject};
use crate::value::{Value, fmt_sequence, hash_sequence};

/// Responsive sequence.
///
/// Every mutating call (`append`, `remove`, `set_at`, `replace`) performs the
/// mutation, wraps any container it introduced, and then publishes exactly one
/// [`ChangeEvent`] before returning. Reads never publish.
///
/// Cloning a `ListWrapper` clones the handle: both clones observe and mutate
/// the same sequence through the same channel.
#[derive(Clone)]
pub struct ListWrapper {
    inner: Arc<ListInner>,
}

struct ListInner {
    items: RwLock<Vec<Value>>,
    subject: Subject,
    link: RootLink,
}

impl ListWrapper {
    /// Wrap `items`, recursively wrapping nested containers.
    ///
    /// With `root == None` this wrapper becomes the root of its structure;
    /// otherwise it forwards everything it publishes to `root`.
    pub(crate) fn new(items: Vec<Value>, root: Option<RootLink>, delivery: Delivery) -> Self {
        let subject = Subject::with_delivery(delivery);
        let link = root.unwrap_or_else(|| RootLink::new(subject.channel_id(), delivery));
        let items: Vec<Value> = items
            .into_iter()
            .map(|item| factory::attach(item, link))
            .collect();
        if let Some(root) = root {
            subject.subscribe(Arc::new(Forwarder::new(root.channel)));
        }

        tracing::debug!(
            source = %subject.source_id(),
            root = %link.channel.source_id(),
            len = items.len(),
            "wrapped sequence"
        );

        Self {
            inner: Arc::new(ListInner {
                items: RwLock::new(items),
                subject,
                link,
            }),
        }
    }

    /// Identity reported as `sourceId`
    pub fn id(&self) -> SourceId {
        self.source_id()
    }

    /// Identity of the root channel this wrapper reports to
    pub fn root_id(&self) -> SourceId {
        self.inner.link.channel.source_id()
    }

    /// Push `value` to the end.
    ///
    /// A responsive container passed in is copied, not shared: later
    /// mutations through the original handle do not reach this list.
    ///
    /// Emits `SEQUENCE / VALUE_ADDED` with `newValue`.
    pub fn append(&self, value: impl Into<Value>) {
        let value = factory::attach(value.into(), self.inner.link);
        self.inner.items.write().push(value.clone());
        self.publish(&ChangeEvent::element_added(self.id(), value));
    }

    /// Remove the first element equal to `value` and return it.
    ///
    /// Emits `SEQUENCE / VALUE_REMOVED` with `oldValue`. Fails with
    /// [`ResponsiveError::NotFound`] if no element matches.
    pub fn remove(&self, value: &Value) -> Result<Value> {
        let removed = loop {
            // Search a copy: comparing may lock `value`, which can be this list.
            let items = self.to_vec();
            let position = items.iter().position(|item| item == value).ok_or_else(|| {
                ResponsiveError::NotFound {
                    value: value.to_string(),
                }
            })?;
            let mut current = self.inner.items.write();
            if current
                .get(position)
                .is_some_and(|item| item.is_identical(&items[position]))
            {
                break current.remove(position);
            }
        };
        self.publish(&ChangeEvent::element_removed(self.id(), removed.clone()));
        Ok(removed)
    }

    /// Replace the element at `index` and return the previous one.
    ///
    /// Negative indices count from the end. A responsive container passed in
    /// is copied, as with [`append`](Self::append). Emits
    /// `SEQUENCE / VALUE_CHANGED` with the resolved `index`, `oldValue` and
    /// `newValue`.
    pub fn set_at(&self, index: isize, value: impl Into<Value>) -> Result<Value> {
        let value = factory::attach(value.into(), self.inner.link);
        let (position, old) = {
            let mut items = self.inner.items.write();
            let position = resolve(index, items.len())?;
            let old = std::mem::replace(&mut items[position], value.clone());
            (position, old)
        };
        self.publish(&ChangeEvent::element_changed(
            self.id(),
            position,
            old.clone(),
            value,
        ));
        Ok(old)
    }

    /// Element at `index` (negative counts from the end)
    pub fn get_at(&self, index: isize) -> Result<Value> {
        let items = self.inner.items.read();
        let position = resolve(index, items.len())?;
        Ok(items[position].clone())
    }

    /// Swap in a whole new sequence.
    ///
    /// `value` must classify as a sequence; its elements are wrapped under this
    /// wrapper's root. A responsive sequence passed in is copied. Emits a
    /// single `SEQUENCE / VALUE_CHANGED` with no index and no values.
    pub fn replace(&self, value: impl Into<Value>) -> Result<()> {
        let Value::List(items) = value.into().snapshot() else {
            return Err(ResponsiveError::NotASequence);
        };
        let items: Vec<Value> = items
            .into_iter()
            .map(|item| factory::attach(item, self.inner.link))
            .collect();
        *self.inner.items.write() = items;
        self.publish(&ChangeEvent::sequence_replaced(self.id()));
        Ok(())
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    /// True when there are no elements
    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// True if any element equals `value`
    pub fn contains(&self, value: &Value) -> bool {
        self.to_vec().iter().any(|item| item == value)
    }

    /// Current elements (nested containers as handles)
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Iterate over a copy of the current elements
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    /// Deep, unwrapped copy of the sequence
    pub fn snapshot(&self) -> Value {
        Value::List(self.inner.items.read().iter().map(Value::snapshot).collect())
    }

    pub(crate) fn with_items<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        f(&self.inner.items.read())
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Map a possibly negative index onto `0..len`.
fn resolve(index: isize, len: usize) -> Result<usize> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        Some(index as usize).filter(|&i| i < len)
    };
    resolved.ok_or(ResponsiveError::IndexOutOfRange { index, len })
}

impl Publisher for ListWrapper {
    fn channel_id(&self) -> ChannelId {
        self.inner.subject.channel_id()
    }
}

impl PartialEq for ListWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.with_items(|a| other.with_items(|b| a == b))
    }
}

impl Eq for ListWrapper {}

impl PartialEq<[Value]> for ListWrapper {
    fn eq(&self, other: &[Value]) -> bool {
        self.with_items(|items| items == other)
    }
}

impl PartialEq<Vec<Value>> for ListWrapper {
    fn eq(&self, other: &Vec<Value>) -> bool {
        self == other.as_slice()
    }
}

impl PartialEq<Value> for ListWrapper {
    fn eq(&self, other: &Value) -> bool {
        Value::ResponsiveList(self.clone()) == *other
    }
}

impl Hash for ListWrapper {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.with_items(|items| hash_sequence(items, state));
    }
}

impl IntoIterator for &ListWrapper {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for ListWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_items(|items| fmt_sequence(items, f))
    }
}

impl fmt::Debug for ListWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListWrapper")
            .field("id", &self.id())
            .field("root", &self.root_id())
            .field("items", &*self.inner.items.read())
            .finish()
    }
}
