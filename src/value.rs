//! The value model: scalars, plain containers and responsive containers.
//!
//! A [`Value`] is classified exactly once per wrap into a [`Kind`]. Plain
//! containers (`List`, `Map`, `Object`) become responsive containers
//! (`ResponsiveList`, `ResponsiveRecord`) when passed through
//! [`make_responsive`](crate::make_responsive); scalars pass through untouched.
//!
//! Wrapping never changes equality or hashing: a responsive list equals, and
//! hashes like, the plain list it wraps.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::error::{ResponsiveError, Result};
use crate::event::SourceId;
use crate::observer::Observer;
use crate::subject::Publisher;
use crate::wrapper::{ListWrapper, RecordWrapper};

/// Classification of a value, decided once at wrap time.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Kind {
    /// Opaque leaf, never wrapped
    Scalar,
    /// Ordered, index-addressable container
    Sequence,
    /// String-keyed container (mapping or object fields)
    RecordLike,
}

/// A user-defined object: a type name plus named fields.
///
/// Classifies as [`Kind::RecordLike`]. Two objects are equal when their type
/// names match and their fields are equal as a set of key/value pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl Object {
    /// Object with no fields yet
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder: add a field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub(crate) fn into_parts(self) -> (String, IndexMap<String, Value>) {
        (self.type_name, self.fields)
    }
}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_record(Some(&self.type_name), &self.fields, state);
    }
}

/// Any value that can live in a responsive structure.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Integer scalar
    Int(i64),
    /// Float scalar (totally ordered so values can be hashed)
    Float(OrderedFloat<f64>),
    /// String scalar
    Str(String),
    /// Plain sequence, not yet responsive
    List(Vec<Value>),
    /// Plain mapping, not yet responsive
    Map(IndexMap<String, Value>),
    /// Plain object, not yet responsive
    Object(Object),
    /// Responsive sequence
    ResponsiveList(ListWrapper),
    /// Responsive mapping or object
    ResponsiveRecord(RecordWrapper),
}

impl Value {
    /// Classify this value
    pub fn kind(&self) -> Kind {
        match self {
            Value::List(_) | Value::ResponsiveList(_) => Kind::Sequence,
            Value::Map(_) | Value::Object(_) | Value::ResponsiveRecord(_) => Kind::RecordLike,
            _ => Kind::Scalar,
        }
    }

    /// True for scalars
    pub fn is_scalar(&self) -> bool {
        self.kind() == Kind::Scalar
    }

    /// True for wrapped containers
    pub fn is_responsive(&self) -> bool {
        matches!(self, Value::ResponsiveList(_) | Value::ResponsiveRecord(_))
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(n.into_inner()),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Responsive sequence handle
    pub fn as_list(&self) -> Option<&ListWrapper> {
        match self {
            Value::ResponsiveList(list) => Some(list),
            _ => None,
        }
    }

    /// Responsive record handle
    pub fn as_record(&self) -> Option<&RecordWrapper> {
        match self {
            Value::ResponsiveRecord(record) => Some(record),
            _ => None,
        }
    }

    /// Identity of the wrapper, if this is a responsive container
    pub fn source_id(&self) -> Option<SourceId> {
        match self {
            Value::ResponsiveList(list) => Some(list.source_id()),
            Value::ResponsiveRecord(record) => Some(record.source_id()),
            _ => None,
        }
    }

    /// Subscribe an observer to this container's channel.
    ///
    /// Fails with [`ResponsiveError::NotAContainer`] unless the value is a
    /// responsive container. See [`Publisher::subscribe`] for the ownership
    /// caveat on observers that hold the structure.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> Result<bool> {
        match self {
            Value::ResponsiveList(list) => Ok(list.subscribe(observer)),
            Value::ResponsiveRecord(record) => Ok(record.subscribe(observer)),
            _ => Err(ResponsiveError::NotAContainer),
        }
    }

    /// Unsubscribe an observer from this container's channel.
    pub fn unsubscribe<O: Observer + ?Sized>(&self, observer: &Arc<O>) -> Result<bool> {
        match self {
            Value::ResponsiveList(list) => Ok(list.unsubscribe(observer)),
            Value::ResponsiveRecord(record) => Ok(record.unsubscribe(observer)),
            _ => Err(ResponsiveError::NotAContainer),
        }
    }

    /// Deep copy with every wrapper replaced by the plain container it wraps.
    pub fn snapshot(&self) -> Value {
        match self {
            Value::List(items) => Value::List(items.iter().map(Value::snapshot).collect()),
            Value::Map(fields) => Value::Map(snapshot_fields(fields)),
            Value::Object(object) => Value::Object(Object {
                type_name: object.type_name.clone(),
                fields: snapshot_fields(&object.fields),
            }),
            Value::ResponsiveList(list) => list.snapshot(),
            Value::ResponsiveRecord(record) => record.snapshot(),
            scalar => scalar.clone(),
        }
    }

    /// Same wrapper handle, or equal non-wrapper values. Never takes a lock on
    /// a wrapper.
    pub(crate) fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::ResponsiveList(a), Value::ResponsiveList(b)) => a.ptr_eq(b),
            (Value::ResponsiveRecord(a), Value::ResponsiveRecord(b)) => a.ptr_eq(b),
            (Value::ResponsiveList(_) | Value::ResponsiveRecord(_), _)
            | (_, Value::ResponsiveList(_) | Value::ResponsiveRecord(_)) => false,
            _ => self == other,
        }
    }

    fn with_sequence<R>(&self, f: impl FnOnce(&[Value]) -> R) -> Option<R> {
        match self {
            Value::List(items) => Some(f(items)),
            Value::ResponsiveList(list) => Some(list.with_items(f)),
            _ => None,
        }
    }

    fn with_record<R>(&self, f: impl FnOnce(Option<&str>, &IndexMap<String, Value>) -> R) -> Option<R> {
        match self {
            Value::Map(fields) => Some(f(None, fields)),
            Value::Object(object) => Some(f(Some(&object.type_name), &object.fields)),
            Value::ResponsiveRecord(record) => Some(record.with_fields(f)),
            _ => None,
        }
    }
}

fn snapshot_fields(fields: &IndexMap<String, Value>) -> IndexMap<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), value.snapshot()))
        .collect()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::ResponsiveList(a), Value::ResponsiveList(b)) => a == b,
            (Value::ResponsiveRecord(a), Value::ResponsiveRecord(b)) => a == b,
            _ => match (self.kind(), other.kind()) {
                (Kind::Sequence, Kind::Sequence) => self
                    .with_sequence(|a| other.with_sequence(|b| a == b))
                    .flatten()
                    .unwrap_or(false),
                (Kind::RecordLike, Kind::RecordLike) => self
                    .with_record(|a_name, a| {
                        other.with_record(|b_name, b| a_name == b_name && a == b)
                    })
                    .flatten()
                    .unwrap_or(false),
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => (1u8, b).hash(state),
            Value::Int(n) => (2u8, n).hash(state),
            Value::Float(n) => (3u8, n).hash(state),
            Value::Str(s) => (4u8, s).hash(state),
            Value::List(items) => hash_sequence(items, state),
            Value::ResponsiveList(list) => list.hash(state),
            Value::Map(fields) => hash_record(None, fields, state),
            Value::Object(object) => object.hash(state),
            Value::ResponsiveRecord(record) => record.hash(state),
        }
    }
}

/// Hash a sequence the same way whether or not it is wrapped.
pub(crate) fn hash_sequence<H: Hasher>(items: &[Value], state: &mut H) {
    5u8.hash(state);
    items.hash(state);
}

/// Hash a record from its key-sorted pairs, so field order does not matter.
pub(crate) fn hash_record<H: Hasher>(
    type_name: Option<&str>,
    fields: &IndexMap<String, Value>,
    state: &mut H,
) {
    6u8.hash(state);
    type_name.hash(state);
    let mut pairs: Vec<_> = fields.iter().collect();
    pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
    pairs.len().hash(state);
    for (key, value) in pairs {
        key.hash(state);
        value.hash(state);
    }
}

pub(crate) fn fmt_sequence(items: &[Value], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

pub(crate) fn fmt_record(
    type_name: Option<&str>,
    fields: &IndexMap<String, Value>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    if let Some(name) = type_name {
        write!(f, "{name} ")?;
    }
    f.write_str("{")?;
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key:?}: {value}")?;
    }
    f.write_str("}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => fmt_sequence(items, f),
            Value::Map(fields) => fmt_record(None, fields, f),
            Value::Object(object) => fmt_record(Some(&object.type_name), &object.fields, f),
            Value::ResponsiveList(list) => fmt::Display::fmt(list, f),
            Value::ResponsiveRecord(record) => fmt::Display::fmt(record, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(OrderedFloat(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Value::Map(fields)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<ListWrapper> for Value {
    fn from(list: ListWrapper) -> Self {
        Value::ResponsiveList(list)
    }
}

impl From<RecordWrapper> for Value {
    fn from(record: RecordWrapper) -> Self {
        Value::ResponsiveRecord(record)
    }
}

/// Integers that fit `i64` become [`Value::Int`]. Any other number, including
/// a `u64` above `i64::MAX`, becomes a [`Value::Float`] and may lose precision.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(OrderedFloat(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Map(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::FastHashBuilder;
    use serde_json::json;
    use std::hash::BuildHasher;

    #[test]
    fn classification() {
        assert_eq!(Value::from(1).kind(), Kind::Scalar);
        assert_eq!(Value::from("x").kind(), Kind::Scalar);
        assert_eq!(Value::Null.kind(), Kind::Scalar);
        assert_eq!(Value::from(vec![1, 2]).kind(), Kind::Sequence);
        assert_eq!(Value::from(json!({"a": 1})).kind(), Kind::RecordLike);
        assert_eq!(Value::from(Object::new("Book")).kind(), Kind::RecordLike);
    }

    #[test]
    fn record_equality_ignores_field_order() {
        let a = Value::from(json!({"a": 1, "b": 2}));
        let b = Value::from(json!({"b": 2, "a": 1}));

        assert_eq!(a, b);
        assert_eq!(FastHashBuilder.hash_one(&a), FastHashBuilder.hash_one(&b));
    }

    #[test]
    fn object_is_not_equal_to_mapping_with_same_fields() {
        let object = Value::from(Object::new("Book").field("title", "x"));
        let mapping = Value::from(json!({"title": "x"}));

        assert_ne!(object, mapping);
    }

    #[test]
    fn sequence_is_never_equal_to_scalar() {
        assert_ne!(Value::from(vec![1]), Value::from(1));
        assert_ne!(Value::from(1), Value::from(1.0));
    }

    #[test]
    fn json_numbers_keep_integer_precision() {
        assert_eq!(Value::from(json!(9876543210i64)), Value::Int(9876543210));
        assert_eq!(Value::from(json!(1234.56789)), Value::from(1234.56789));
    }

    #[test]
    fn display_renders_nested_data() {
        let value = Value::from(json!({"some_list": [1, "two", {"x": null}], "flag": true}));

        assert_eq!(
            value.to_string(),
            r#"{"some_list": [1, "two", {"x": null}], "flag": true}"#
        );
    }

    #[test]
    fn json_integer_beyond_i64_becomes_float() {
        let value = Value::from(serde_json::json!(u64::MAX));

        assert_eq!(value.as_int(), None);
        assert_eq!(value.as_float(), Some(u64::MAX as f64));
        assert_eq!(Value::from(serde_json::json!(i64::MAX)), Value::Int(i64::MAX));
    }

    #[test]
    fn identical_compares_wrappers_by_handle() {
        let a = crate::make_responsive(vec![1]);
        let b = crate::make_responsive(vec![1]);

        assert_eq!(a, b);
        assert!(a.is_identical(&a.clone()));
        assert!(!a.is_identical(&b));
        assert!(!a.is_identical(&Value::from(vec![1])));
        assert!(Value::Int(1).is_identical(&Value::Int(1)));
    }

    #[test]
    fn subscribe_on_scalar_fails() {
        let observer = Arc::new(crate::observer::DoNothingObserver);

        assert_eq!(
            Value::from(3).subscribe(observer),
            Err(ResponsiveError::NotAContainer)
        );
    }
}
