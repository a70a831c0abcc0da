#![deny(missing_docs)]

//! Responsive data structures: observable nested records and sequences.
//!
//! This crate makes an arbitrary nested structure of records, sequences and
//! user-defined objects "responsive": every in-place mutation, at any depth,
//! synchronously notifies the observers registered on the structure's root
//! with a structured [`ChangeEvent`] describing exactly what changed.
//!
//! # Quick Start
//!
//! ```ignore
//! use responsive::{make_responsive, Publisher, RecordingObserver, Value};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let root = make_responsive(json!({"some_list": [1, 2, 3, 4, 5]}));
//! let observer = Arc::new(RecordingObserver::new());
//! root.subscribe(observer.clone())?;
//!
//! let list = root.as_record().unwrap().get("some_list")?;
//! list.as_list().unwrap().append(6);
//!
//! // One VALUE_ADDED event, delivered on the root channel
//! assert_eq!(observer.count(), 1);
//! ```
//!
//! # Core Types
//!
//! - [`make_responsive`] / [`Options`] - Wrap a value and every container nested in it.
//! - [`ListWrapper`] - Responsive sequence: `append`, `remove`, `set_at`, `replace`.
//! - [`RecordWrapper`] - Responsive mapping or object: `get`, `set`.
//! - [`Subject`] - Ordered, identity-deduplicated observer set.
//! - [`Observer`] - Receives [`ChangeEvent`]s, optionally filtered by [`Interests`].
//!
//! # Propagation
//!
//! The outermost wrapper created by [`make_responsive`] is the root. Every
//! nested wrapper owns its own channel and forwards what it publishes straight
//! to the root's channel, so observers on the root see mutations at any depth.
//! Observers on a nested wrapper see only mutations made directly on that
//! wrapper, not those made on containers nested inside it.
//!
//! ```ignore
//! let root = make_responsive(json!({"outer": {"inner": "a"}}));
//! root.subscribe(observer.clone())?;
//!
//! let outer = root.as_record().unwrap().get("outer")?;
//! outer.as_record().unwrap().set("inner", "b")?;  // delivered to `observer`
//! ```
//!
//! # Interests
//!
//! ```ignore
//! let evens = Interests::new().with("newValue", |v| v.as_int().is_some_and(|n| n % 2 == 0));
//! let observer = Arc::new(RecordingObserver::with_interests(evens));
//! ```
//!
//! # Threading
//!
//! All delivery is synchronous: a mutating call returns after every observer
//! has been notified. Containers are internally locked, but concurrent
//! mutation of one structure is not a supported use; serialize it externally.

// Internal modules
pub(crate) mod arena;
mod error;
mod event;
mod factory;
mod hash;
mod observer;
mod subject;
mod value;
mod wrapper;

// Core types
pub use error::{ResponsiveError, Result};
pub use event::{ChangeEvent, Context, Operation, SourceId, attr};
pub use observer::{
    DoNothingObserver, Interests, Observer, OutputObserver, Predicate, RecordingObserver,
};
pub use subject::{Delivery, Publisher, Subject};
pub use value::{Kind, Object, Value};
pub use wrapper::{ListWrapper, RecordWrapper};

// Entry points
pub use factory::{Options, make_responsive};

// Channel handle, exposed through `Publisher::channel_id`
pub use arena::ChannelId;
