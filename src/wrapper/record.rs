use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::arena::ChannelId;
use crate::error::{ResponsiveError, Result};
use crate::event::{ChangeEvent, SourceId};
use crate::factory::{self, RootLink};
use crate::subject::{Delivery, Forwarder, Publisher, Subject};
use crate::value::{Kind, Object, Value, fmt_record, hash_record};

/// Responsive record: a string-keyed mapping or the named fields of an object.
///
/// The set of keys is fixed when the record is wrapped; [`set`](Self::set)
/// assigns existing fields only. Each successful `set` publishes exactly one
/// [`ChangeEvent`]. Reads never publish.
///
/// Cloning a `RecordWrapper` clones the handle.
#[derive(Clone)]
pub struct RecordWrapper {
    inner: Arc<RecordInner>,
}

struct RecordInner {
    fields: RwLock<IndexMap<String, Value>>,
    /// `Some` for objects, `None` for mappings.
    type_name: Option<String>,
    subject: Subject,
    link: RootLink,
}

impl RecordWrapper {
    /// Wrap `fields`, recursively wrapping nested containers.
    pub(crate) fn new(
        type_name: Option<String>,
        fields: IndexMap<String, Value>,
        root: Option<RootLink>,
        delivery: Delivery,
    ) -> Self {
        let subject = Subject::with_delivery(delivery);
        let link = root.unwrap_or_else(|| RootLink::new(subject.channel_id(), delivery));
        let fields: IndexMap<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key, factory::attach(value, link)))
            .collect();
        if let Some(root) = root {
            subject.subscribe(Arc::new(Forwarder::new(root.channel)));
        }

        tracing::debug!(
            source = %subject.source_id(),
            root = %link.channel.source_id(),
            type_name = type_name.as_deref().unwrap_or("<mapping>"),
            len = fields.len(),
            "wrapped record"
        );

        Self {
            inner: Arc::new(RecordInner {
                fields: RwLock::new(fields),
                type_name,
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

    /// Object type name, `None` for a plain mapping
    pub fn type_name(&self) -> Option<&str> {
        self.inner.type_name.as_deref()
    }

    /// Value of field `key`
    pub fn get(&self, key: &str) -> Result<Value> {
        self.inner
            .fields
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| key_not_found(key))
    }

    /// Assign field `key`.
    ///
    /// Emits `RECORD / VALUE_CHANGED` with `key`, `oldValue` and `newValue`.
    /// If the field currently holds a responsive list and `value` is a
    /// sequence, the list's content is replaced in place instead, and the
    /// list emits its own `SEQUENCE / VALUE_CHANGED`.
    ///
    /// A responsive container passed in is copied, not shared:
    /// `record.set("b", record.get("a")?)` leaves `a` and `b` independent.
    ///
    /// Fails with [`ResponsiveError::KeyNotFound`] for an unknown field.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Value::ResponsiveList(list) = self.get(key)? {
            if value.kind() == Kind::Sequence {
                cov_mark::hit!(record_set_replaces_list_in_place);
                return list.replace(value);
            }
        }

        let value = factory::attach(value, self.inner.link);
        let old = {
            let mut fields = self.inner.fields.write();
            let slot = fields.get_mut(key).ok_or_else(|| key_not_found(key))?;
            std::mem::replace(slot, value.clone())
        };
        self.publish(&ChangeEvent::field_changed(self.id(), key, old, value));
        Ok(())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    /// True when there are no fields
    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// True if `key` names a field
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    /// Field names in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.read().keys().cloned().collect()
    }

    /// Current fields (nested containers as handles)
    pub fn to_map(&self) -> IndexMap<String, Value> {
        self.inner.fields.read().clone()
    }

    /// Deep, unwrapped copy: a `Map` for mappings, an `Object` for objects
    pub fn snapshot(&self) -> Value {
        let fields = self.inner.fields.read();
        match &self.inner.type_name {
            Some(type_name) => Value::Object(fields.iter().fold(
                Object::new(type_name.clone()),
                |object, (key, value)| object.field(key.clone(), value.snapshot()),
            )),
            None => Value::Map(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.snapshot()))
                    .collect(),
            ),
        }
    }

    pub(crate) fn with_fields<R>(
        &self,
        f: impl FnOnce(Option<&str>, &IndexMap<String, Value>) -> R,
    ) -> R {
        f(self.type_name(), &self.inner.fields.read())
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn key_not_found(key: &str) -> ResponsiveError {
    ResponsiveError::KeyNotFound {
        key: key.to_owned(),
    }
}

impl Publisher for RecordWrapper {
    fn channel_id(&self) -> ChannelId {
        self.inner.subject.channel_id()
    }
}

impl PartialEq for RecordWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || self.with_fields(|a_name, a| {
                other.with_fields(|b_name, b| a_name == b_name && a == b)
            })
    }
}

impl Eq for RecordWrapper {}

impl PartialEq<Value> for RecordWrapper {
    fn eq(&self, other: &Value) -> bool {
        Value::ResponsiveRecord(self.clone()) == *other
    }
}

impl Hash for RecordWrapper {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.with_fields(|type_name, fields| hash_record(type_name, fields, state));
    }
}

impl fmt::Display for RecordWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_fields(|type_name, fields| fmt_record(type_name, fields, f))
    }
}

impl fmt::Debug for RecordWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordWrapper")
            .field("id", &self.id())
            .field("root", &self.root_id())
            .field("type_name", &self.inner.type_name)
            .field("fields", &*self.inner.fields.read())
            .finish()
    }
}
