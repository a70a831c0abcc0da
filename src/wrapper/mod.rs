//! Container wrappers: the sequence and record variants.
//!
//! Both variants own their container behind a lock, own a [`Subject`](crate::Subject)
//! for their own observers, and remember the root channel of the structure
//! they belong to. Nested wrappers reach the root through a forwarding
//! subscription on their own channel.

mod list;
mod record;

pub use list::ListWrapper;
pub use record::RecordWrapper;
