// Arena-based storage for notification channel metadata
//
// Channels live in a global slab behind a RwLock; ChannelId is a lightweight
// Copy handle that indexes into it. Observers and the delivery policy are
// stored here, the observed values stay in the wrappers.

pub mod channel_arena;

pub use channel_arena::{ChannelId, ChannelMetadata, channel_arena_insert, channel_arena_remove};
