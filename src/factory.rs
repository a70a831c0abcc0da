//! The responsive factory: classify a value, wrap it if it is a container, and
//! wire every nested wrapper to a single root channel.
//!
//! ## Usage
//!
//! ```ignore
//! // Default configuration: observer panics propagate to the mutating caller
//! let book = make_responsive(json!({"title": "", "authors": []}));
//!
//! // Isolate observer panics instead
//! let book = Options::new()
//!     .delivery(Delivery::Isolate)
//!     .make_responsive(json!({"title": "", "authors": []}));
//! ```
//!
//! The caller must drop the original, unwrapped value: mutations made through
//! it do not notify anyone.

use crate::arena::ChannelId;
use crate::subject::Delivery;
use crate::value::Value;
use crate::wrapper::{ListWrapper, RecordWrapper};

/// Wrap `value` with the default [`Options`].
///
/// Scalars come back unchanged. Containers come back as responsive
/// containers whose every nested container is wrapped too; the returned
/// wrapper is the root channel for all of them.
///
/// A value that is already responsive is unwrapped into a deep copy and the
/// copy is wrapped. The result is independent of the original: mutations
/// through one are not seen by the other. The same holds for responsive
/// values passed to `append`, `set_at`, `replace` and `set`.
pub fn make_responsive(value: impl Into<Value>) -> Value {
    Options::default().make_responsive(value)
}

/// Configuration for [`make_responsive`].
///
/// The settings are recorded on the root channel and inherited by every
/// container wrapped into the structure later on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    delivery: Delivery,
}

impl Options {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the observer fault policy
    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Wrap `value` using these options
    pub fn make_responsive(&self, value: impl Into<Value>) -> Value {
        wrap(value.into(), None, self.delivery)
    }
}

/// Where a wrapper reports to: the root channel of its structure and the
/// delivery policy the structure was created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RootLink {
    pub(crate) channel: ChannelId,
    pub(crate) delivery: Delivery,
}

impl RootLink {
    pub(crate) fn new(channel: ChannelId, delivery: Delivery) -> Self {
        Self { channel, delivery }
    }
}

/// Wrap a value that is entering an existing structure under `root`.
pub(crate) fn attach(value: Value, root: RootLink) -> Value {
    wrap(value, Some(root), root.delivery)
}

fn wrap(value: Value, root: Option<RootLink>, delivery: Delivery) -> Value {
    // A wrapper entering the factory is unwrapped first so it never ends up
    // wrapped twice or shared between two roots.
    let value = if value.is_responsive() {
        cov_mark::hit!(factory_unwraps_wrapper);
        value.snapshot()
    } else {
        value
    };

    match value {
        Value::List(items) => ListWrapper::new(items, root, delivery).into(),
        Value::Map(fields) => RecordWrapper::new(None, fields, root, delivery).into(),
        Value::Object(object) => {
            let (type_name, fields) = object.into_parts();
            RecordWrapper::new(Some(type_name), fields, root, delivery).into()
        }
        scalar => scalar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Publisher;
    use crate::value::Kind;
    use serde_json::json;

    #[test]
    fn scalars_pass_through() {
        assert_eq!(make_responsive(3), Value::Int(3));
        assert_eq!(make_responsive("text"), Value::from("text"));
        assert!(!make_responsive(Value::Null).is_responsive());
    }

    #[test]
    fn containers_are_wrapped_at_every_depth() {
        let root = make_responsive(json!({
            "some_list": [1, 2, [3, {"inner": [4]}]],
            "some_dict": {"other": {"deep": []}},
        }));

        fn assert_wrapped(value: &Value) {
            match value.kind() {
                Kind::Scalar => {}
                Kind::Sequence => {
                    let list = value.as_list().expect("sequence is wrapped");
                    list.iter().for_each(|item| assert_wrapped(&item));
                }
                Kind::RecordLike => {
                    let record = value.as_record().expect("record is wrapped");
                    record.to_map().values().for_each(assert_wrapped);
                }
            }
        }
        assert_wrapped(&root);
    }

    #[test]
    fn outermost_wrapper_is_root_of_all_descendants() {
        let root = make_responsive(json!({"a": [{"b": []}]}));
        let root_id = root.source_id().unwrap();

        let a = root.as_record().unwrap().get("a").unwrap();
        let b = a.as_list().unwrap().get_at(0).unwrap();
        let b_list = b.as_record().unwrap().get("b").unwrap();

        assert_eq!(root.as_record().unwrap().root_id(), root_id);
        assert_eq!(a.as_list().unwrap().root_id(), root_id);
        assert_eq!(b.as_record().unwrap().root_id(), root_id);
        assert_eq!(b_list.as_list().unwrap().root_id(), root_id);
        assert_ne!(b_list.source_id(), Some(root_id));
    }

    #[test]
    fn nested_wrappers_forward_through_one_subscription() {
        let root = make_responsive(json!({"outer": {"inner": "a"}}));
        let outer = root.as_record().unwrap().get("outer").unwrap();

        assert_eq!(root.as_record().unwrap().observer_count(), 0);
        assert_eq!(outer.as_record().unwrap().observer_count(), 1);
    }

    #[test]
    fn wrapped_value_is_unwrapped_before_rewrapping() {
        cov_mark::check!(factory_unwraps_wrapper);
        let first = make_responsive(vec![1, 2, 3]);

        let second = make_responsive(first.clone());

        assert_eq!(first, second);
        assert_ne!(first.source_id(), second.source_id());
        assert!(second.as_list().unwrap().get_at(0).unwrap().is_scalar());
    }

    #[test]
    fn options_delivery_is_inherited_by_children() {
        let root = Options::new()
            .delivery(Delivery::Isolate)
            .make_responsive(json!({"a": []}));
        let record = root.as_record().unwrap();
        record.set("a", json!({"b": 1})).unwrap();

        let child = record.get("a").unwrap();
        assert_eq!(child.as_record().unwrap().channel_id().delivery(), Delivery::Isolate);
    }
}
