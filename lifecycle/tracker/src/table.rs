//! Bounded table capabilities
//!
//! Handlers never touch maps directly. Each table is handed in through
//! these traits so that the same logic runs against BPF maps in the kernel
//! and against in-memory tables in tests.
//!
//! Every operation is a single-key point operation and is atomic on its
//! own. Sequences of operations are not, so callers treat a miss as "not
//! tracked" and copy values out instead of holding references.

/// Point lookup returning a copy of the stored value
pub trait Lookup<K, V> {
    fn get(&self, key: &K) -> Option<V>;
}

/// Point delete; deleting a missing key is a no-op
pub trait Remove<K> {
    fn remove(&self, key: &K);
}

/// Read-write bounded table with least-recently-used eviction
pub trait Table<K, V>: Lookup<K, V> + Remove<K> {
    /// Insert or overwrite. Failures (e.g. a full non-LRU map) are dropped.
    fn insert(&self, key: &K, value: &V);

    /// Insert only if `key` is absent. Returns true if the value was written.
    fn insert_new(&self, key: &K, value: &V) -> bool;
}
