//! Structured change events broadcast by responsive containers.
//!
//! One [`ChangeEvent`] is produced per mutating call and delivered as-is; events
//! are never merged or batched. Observers that declare interests are matched
//! against the event's attributes by their stable names (see [`attr`]).

use std::fmt;

use crate::Value;

/// Stable attribute names used by interest maps.
///
/// These strings are part of the public contract: an observer interested in
/// `"newValue"` keeps working across releases.
pub mod attr {
    /// Identity of the wrapper whose container was mutated.
    pub const SOURCE_ID: &str = "sourceId";
    /// `"RECORD"` or `"SEQUENCE"`.
    pub const CONTEXT: &str = "context";
    /// `"VALUE_CHANGED"`, `"VALUE_ADDED"` or `"VALUE_REMOVED"`.
    pub const OPERATION: &str = "operation";
    /// Record field name, present for record events only.
    pub const KEY: &str = "key";
    /// Resolved sequence position, present for indexed assignment only.
    pub const INDEX: &str = "index";
    /// Value before the mutation.
    pub const OLD_VALUE: &str = "oldValue";
    /// Value after the mutation.
    pub const NEW_VALUE: &str = "newValue";

    /// All attribute names, in the order they are tested against interests.
    pub const ALL: [&str; 7] = [
        SOURCE_ID, CONTEXT, OPERATION, KEY, INDEX, OLD_VALUE, NEW_VALUE,
    ];
}

/// Identity of a wrapper, assigned once at creation and never reused.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn new(serial: u64) -> Self {
        Self(serial)
    }

    /// Raw serial number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of container that emitted the event.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Context {
    /// Mapping or object fields
    Record,
    /// Ordered sequence
    Sequence,
}

impl Context {
    /// Upper-case contract name
    pub fn as_str(self) -> &'static str {
        match self {
            Context::Record => "RECORD",
            Context::Sequence => "SEQUENCE",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the container.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Operation {
    /// An existing slot got a new value, or a sequence was replaced wholesale.
    ValueChanged,
    /// A value was appended.
    ValueAdded,
    /// A value was removed.
    ValueRemoved,
}

impl Operation {
    /// Upper-case contract name
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ValueChanged => "VALUE_CHANGED",
            Operation::ValueAdded => "VALUE_ADDED",
            Operation::ValueRemoved => "VALUE_REMOVED",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a single mutation.
///
/// `key` is set for record events, `index` for indexed sequence assignment.
/// `old_value` is absent for [`Operation::ValueAdded`], `new_value` is absent
/// for [`Operation::ValueRemoved`]. A wholesale sequence replacement carries
/// neither.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    /// Wrapper that performed the mutation
    pub source_id: SourceId,
    /// Record or sequence
    pub context: Context,
    /// Kind of mutation
    pub operation: Operation,
    /// Field name (record events)
    pub key: Option<String>,
    /// Resolved position (indexed sequence assignment)
    pub index: Option<usize>,
    /// Previous value
    pub old_value: Option<Value>,
    /// Value after the mutation
    pub new_value: Option<Value>,
}

impl ChangeEvent {
    /// Bare event with no slot or values attached
    pub fn new(source_id: SourceId, context: Context, operation: Operation) -> Self {
        Self {
            source_id,
            context,
            operation,
            key: None,
            index: None,
            old_value: None,
            new_value: None,
        }
    }

    /// A record field was assigned.
    pub fn field_changed(source_id: SourceId, key: &str, old: Value, new: Value) -> Self {
        Self::new(source_id, Context::Record, Operation::ValueChanged)
            .with_key(key)
            .with_old_value(old)
            .with_new_value(new)
    }

    /// A value was appended to a sequence.
    pub fn element_added(source_id: SourceId, new: Value) -> Self {
        Self::new(source_id, Context::Sequence, Operation::ValueAdded).with_new_value(new)
    }

    /// A value was removed from a sequence.
    pub fn element_removed(source_id: SourceId, old: Value) -> Self {
        Self::new(source_id, Context::Sequence, Operation::ValueRemoved).with_old_value(old)
    }

    /// A sequence slot was assigned.
    pub fn element_changed(source_id: SourceId, index: usize, old: Value, new: Value) -> Self {
        Self::new(source_id, Context::Sequence, Operation::ValueChanged)
            .with_index(index)
            .with_old_value(old)
            .with_new_value(new)
    }

    /// A sequence's content was replaced wholesale.
    pub fn sequence_replaced(source_id: SourceId) -> Self {
        Self::new(source_id, Context::Sequence, Operation::ValueChanged)
    }

    /// Attach a record key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach a sequence index
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attach the previous value
    pub fn with_old_value(mut self, value: impl Into<Value>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    /// Attach the new value
    pub fn with_new_value(mut self, value: impl Into<Value>) -> Self {
        self.new_value = Some(value.into());
        self
    }

    /// Look up an attribute by its contract name.
    ///
    /// Returns `None` for unknown names and for attributes this event does
    /// not carry.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            attr::SOURCE_ID => Some(Value::Int(self.source_id.get() as i64)),
            attr::CONTEXT => Some(Value::from(self.context.as_str())),
            attr::OPERATION => Some(Value::from(self.operation.as_str())),
            attr::KEY => self.key.as_deref().map(Value::from),
            attr::INDEX => self.index.map(|index| Value::Int(index as i64)),
            attr::OLD_VALUE => self.old_value.clone(),
            attr::NEW_VALUE => self.new_value.clone(),
            _ => None,
        }
    }

    /// Iterate over the attributes this event carries, in [`attr::ALL`] order.
    pub fn attributes(&self) -> impl Iterator<Item = (&'static str, Value)> + '_ {
        attr::ALL
            .into_iter()
            .filter_map(|name| self.attribute(name).map(|value| (name, value)))
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source_id, self.context, self.operation)?;
        if let Some(key) = &self.key {
            write!(f, " key={key:?}")?;
        }
        if let Some(index) = self.index {
            write!(f, " index={index}")?;
        }
        if let Some(old) = &self.old_value {
            write!(f, " old={old}")?;
        }
        if let Some(new) = &self.new_value {
            write!(f, " new={new}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_event_has_no_old_value() {
        let event = ChangeEvent::element_added(SourceId::new(7), Value::Int(6));

        assert_eq!(event.attribute(attr::OLD_VALUE), None);
        assert_eq!(event.attribute(attr::NEW_VALUE), Some(Value::Int(6)));
        assert_eq!(event.attribute(attr::SOURCE_ID), Some(Value::Int(7)));
        assert_eq!(
            event.attribute(attr::OPERATION),
            Some(Value::from("VALUE_ADDED"))
        );
    }

    #[test]
    fn attributes_follow_contract_order() {
        let event = ChangeEvent::field_changed(
            SourceId::new(1),
            "inner",
            Value::from("a"),
            Value::from("b"),
        );

        let names: Vec<_> = event.attributes().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            ["sourceId", "context", "operation", "key", "oldValue", "newValue"]
        );
    }

    #[test]
    fn unknown_attribute_is_absent() {
        let event = ChangeEvent::sequence_replaced(SourceId::new(3));

        assert_eq!(event.attribute("value"), None);
        assert_eq!(event.attribute(attr::INDEX), None);
    }

    #[test]
    fn display_includes_slot_and_values() {
        let event =
            ChangeEvent::element_changed(SourceId::new(2), 1, Value::Int(3), Value::Int(9));

        assert_eq!(
            event.to_string(),
            "#2 SEQUENCE VALUE_CHANGED index=1 old=3 new=9"
        );
    }
}
