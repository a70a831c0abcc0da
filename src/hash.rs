//! Deterministic hashing for observer sets, interest maps and record values.
//!
//! Record hashes must not depend on which `HashSet` or `HashMap` a value ends
//! up in, and observer lookups are keyed by pointer; neither needs HashDoS
//! resistance, so a fixed-seed foldhash is used throughout.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};
use indexmap::IndexMap;

/// Insertion-ordered map hashed with [`FastHashBuilder`]
pub(crate) type FastIndexMap<K, V> = IndexMap<K, V, FastHashBuilder>;

/// Zero-sized `BuildHasher`: foldhash with a fixed seed.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(0x517cc1b727220a95).build_hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn builder_is_zero_sized() {
        assert_eq!(std::mem::size_of::<FastHashBuilder>(), 0);
    }

    #[test]
    fn record_hash_ignores_field_order() {
        let ab: Value = [("a", 1), ("b", 2)].into_iter().collect();
        let ba: Value = [("b", 2), ("a", 1)].into_iter().collect();

        assert_eq!(FastHashBuilder.hash_one(&ab), FastHashBuilder.hash_one(&ba));
    }

    #[test]
    fn index_map_keeps_insertion_order() {
        let mut map = FastIndexMap::default();
        map.insert("newValue", 1);
        map.insert("key", 2);

        assert_eq!(map.keys().copied().collect::<Vec<_>>(), ["newValue", "key"]);
    }
}
