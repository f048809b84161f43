//! Bitset-keyed cache of aggregated type descriptors
//!
//! The primary key → value map is unsynchronized and is only mutated during
//! the single-threaded build phase of a snapshot; after `seal()` the cache
//! is published behind an `Arc` and read concurrently without locks.
//!
//! A secondary index groups cached keys by bit count so `find_best` can
//! scan most-specific combinations first. That index is consulted by
//! concurrent readers after publication, so reads take the shared side of a
//! reader/writer lock and the build thread takes the exclusive side on
//! insert.

use crate::key::AggregateKey;
use lattice_core::{Result, Seal, Sealable};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// First-write-wins cache of values keyed by name-set bitset keys
pub struct AggregateCache<T> {
    /// Primary map. Single-threaded writes during build, lock-free reads
    /// after seal.
    entries: FxHashMap<AggregateKey, T>,
    /// Keys grouped by bit count, each bucket ordered most-specific first
    by_bits: RwLock<BTreeMap<u32, BTreeSet<AggregateKey>>>,
    seal: Seal,
}

impl<T> AggregateCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        AggregateCache {
            entries: FxHashMap::default(),
            by_bits: RwLock::new(BTreeMap::new()),
            seal: Seal::new(),
        }
    }

    /// Key for a single type name
    pub fn key_for_name(&self, name: &str) -> AggregateKey {
        AggregateKey::for_name(name)
    }

    /// Key for a set of type names
    pub fn key_for<I, S>(&self, names: I) -> AggregateKey
    where
        I: IntoIterator<Item = S>,
        S: Borrow<str>,
    {
        AggregateKey::for_names(names)
    }

    /// Number of cached combinations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a combination is cached under exactly this key
    pub fn contains_key(&self, key: &AggregateKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up the value cached under exactly this key
    pub fn get(&self, key: &AggregateKey) -> Option<&T> {
        self.entries.get(key)
    }

    /// Mutable lookup, build phase only
    pub fn get_mut(&mut self, key: &AggregateKey) -> Result<Option<&mut T>> {
        self.seal.check_unsealed("AggregateCache")?;
        Ok(self.entries.get_mut(key))
    }

    /// Insert a value under a key, first-write-wins.
    ///
    /// An existing mapping for an equal key is never overwritten: the new
    /// value is discarded and `false` returned.
    pub fn put(&mut self, key: AggregateKey, value: T) -> Result<bool> {
        self.seal.check_unsealed("AggregateCache")?;
        if self.entries.contains_key(&key) {
            return Ok(false);
        }
        self.by_bits
            .write()
            .entry(key.num_bits())
            .or_default()
            .insert(key.clone());
        self.entries.insert(key, value);
        Ok(true)
    }

    /// Remove a value during build (take-out/put-back mutation)
    pub fn remove(&mut self, key: &AggregateKey) -> Result<Option<T>> {
        self.seal.check_unsealed("AggregateCache")?;
        let removed = self.entries.remove(key);
        if removed.is_some() {
            let mut by_bits = self.by_bits.write();
            if let Some(bucket) = by_bits.get_mut(&key.num_bits()) {
                bucket.remove(key);
                if bucket.is_empty() {
                    by_bits.remove(&key.num_bits());
                }
            }
        }
        Ok(removed)
    }

    /// Largest cached proper subset of `key`, most specific first.
    ///
    /// Scans the bit-count buckets from `key.num_bits() - 1` down to 1 and
    /// returns the first cached key whose names are a subset of `key`'s.
    /// Ties within a bucket resolve by the bucket's ordering. Greedy, not
    /// globally optimal.
    pub fn find_best(&self, key: &AggregateKey) -> Option<AggregateKey> {
        if key.is_empty() {
            return None;
        }
        let by_bits = self.by_bits.read();
        for (_, bucket) in by_bits.range(1..key.num_bits()).rev() {
            for candidate in bucket {
                if key.contains(candidate) {
                    return Some(candidate.clone());
                }
            }
        }
        None
    }

    /// All cached keys (cloned, so the cache can be mutated while walking)
    pub fn keys(&self) -> Vec<AggregateKey> {
        self.entries.keys().cloned().collect()
    }

    /// Iterate cached values
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

impl<T> Default for AggregateCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Sealable> Sealable for AggregateCache<T> {
    fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }

    fn seal(&mut self) {
        if self.seal.seal() {
            for value in self.entries.values_mut() {
                value.seal();
            }
        }
    }
}

impl<T> fmt::Debug for AggregateCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateCache")
            .field("entry_count", &self.entries.len())
            .field("bit_buckets", &self.by_bits.read().len())
            .field("sealed", &self.seal.is_sealed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal sealable value for cache tests
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Entry {
        tag: &'static str,
        seal: Seal,
    }

    impl Entry {
        fn new(tag: &'static str) -> Self {
            Entry {
                tag,
                seal: Seal::new(),
            }
        }
    }

    impl Sealable for Entry {
        fn is_sealed(&self) -> bool {
            self.seal.is_sealed()
        }
        fn seal(&mut self) {
            self.seal.seal();
        }
    }

    fn key(names: &[&str]) -> AggregateKey {
        AggregateKey::for_names(names.iter().copied())
    }

    // === Basic put/get ===

    #[test]
    fn test_new_cache_is_empty() {
        let cache: AggregateCache<Entry> = AggregateCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = AggregateCache::new();
        let k = key(&["c:a"]);
        assert!(cache.put(k.clone(), Entry::new("a")).unwrap());
        assert_eq!(cache.get(&k).unwrap().tag, "a");
        assert!(cache.contains_key(&k));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let cache: AggregateCache<Entry> = AggregateCache::new();
        assert!(cache.get(&key(&["c:nothing"])).is_none());
    }

    // === First-write-wins ===

    #[test]
    fn test_put_is_first_write_wins() {
        let mut cache = AggregateCache::new();
        let k = key(&["c:fww1", "c:fww2"]);
        assert!(cache.put(k.clone(), Entry::new("first")).unwrap());
        // Equal key: new value discarded
        assert!(!cache.put(k.clone(), Entry::new("second")).unwrap());
        assert_eq!(cache.get(&k).unwrap().tag, "first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_equal_key_different_construction_order() {
        let mut cache = AggregateCache::new();
        let k1 = key(&["c:x", "c:y"]);
        let k2 = key(&["c:y", "c:x"]);
        assert!(cache.put(k1, Entry::new("v1")).unwrap());
        assert!(!cache.put(k2.clone(), Entry::new("v2")).unwrap());
        assert_eq!(cache.get(&k2).unwrap().tag, "v1");
    }

    // === find_best ===

    #[test]
    fn test_find_best_prefers_largest_subset() {
        let mut cache = AggregateCache::new();
        cache.put(key(&["f:a"]), Entry::new("a")).unwrap();
        cache.put(key(&["f:b"]), Entry::new("b")).unwrap();
        cache.put(key(&["f:a", "f:b"]), Entry::new("ab")).unwrap();

        // Query {a, b, c} with c uncached: the two-bit subset must win
        let query = key(&["f:a", "f:b", "f:c"]);
        let best = cache.find_best(&query).unwrap();
        assert_eq!(best, key(&["f:a", "f:b"]));
    }

    #[test]
    fn test_find_best_skips_non_subsets() {
        let mut cache = AggregateCache::new();
        cache.put(key(&["f:p", "f:q"]), Entry::new("pq")).unwrap();
        cache.put(key(&["f:p"]), Entry::new("p")).unwrap();

        // {p, r}: {p,q} has more bits but is not a subset
        let query = key(&["f:p", "f:r"]);
        assert_eq!(cache.find_best(&query).unwrap(), key(&["f:p"]));
    }

    #[test]
    fn test_find_best_never_returns_exact_key() {
        let mut cache = AggregateCache::new();
        let k = key(&["f:solo"]);
        cache.put(k.clone(), Entry::new("solo")).unwrap();
        // Scan starts below the query's own bit count
        assert!(cache.find_best(&k).is_none());
    }

    #[test]
    fn test_find_best_on_empty_cache() {
        let cache: AggregateCache<Entry> = AggregateCache::new();
        assert!(cache.find_best(&key(&["f:a", "f:b"])).is_none());
    }

    // === remove ===

    #[test]
    fn test_remove_clears_both_indexes() {
        let mut cache = AggregateCache::new();
        let ab = key(&["r:a", "r:b"]);
        cache.put(key(&["r:a"]), Entry::new("a")).unwrap();
        cache.put(ab.clone(), Entry::new("ab")).unwrap();

        let removed = cache.remove(&ab).unwrap().unwrap();
        assert_eq!(removed.tag, "ab");
        assert!(!cache.contains_key(&ab));
        // The two-bit bucket is gone: find_best falls back to the single
        let best = cache.find_best(&key(&["r:a", "r:b", "r:c"])).unwrap();
        assert_eq!(best, key(&["r:a"]));
    }

    #[test]
    fn test_remove_then_put_back() {
        let mut cache = AggregateCache::new();
        let k = key(&["r:t"]);
        cache.put(k.clone(), Entry::new("v")).unwrap();
        let taken = cache.remove(&k).unwrap().unwrap();
        assert!(cache.put(k.clone(), taken).unwrap());
        assert_eq!(cache.get(&k).unwrap().tag, "v");
    }

    // === Seal discipline ===

    #[test]
    fn test_seal_freezes_cache_and_values() {
        let mut cache = AggregateCache::new();
        let k = key(&["s:a"]);
        cache.put(k.clone(), Entry::new("a")).unwrap();
        cache.seal();

        assert!(cache.is_sealed());
        assert!(cache.get(&k).unwrap().is_sealed());
        assert!(cache.put(key(&["s:b"]), Entry::new("b")).is_err());
        assert!(cache.remove(&k).is_err());
        assert!(cache.get_mut(&k).is_err());
        // Reads keep working
        assert_eq!(cache.get(&k).unwrap().tag, "a");
    }

    #[test]
    fn test_seal_is_idempotent() {
        let mut cache: AggregateCache<Entry> = AggregateCache::new();
        cache.seal();
        cache.seal();
        assert!(cache.is_sealed());
    }

    #[test]
    fn test_find_best_still_works_after_seal() {
        let mut cache = AggregateCache::new();
        cache.put(key(&["s:x"]), Entry::new("x")).unwrap();
        cache.seal();
        let best = cache.find_best(&key(&["s:x", "s:y"])).unwrap();
        assert_eq!(best, key(&["s:x"]));
    }

    // === Debug ===

    #[test]
    fn test_debug_output() {
        let mut cache = AggregateCache::new();
        cache.put(key(&["d:a"]), Entry::new("a")).unwrap();
        let debug = format!("{:?}", cache);
        assert!(debug.contains("AggregateCache"));
        assert!(debug.contains("entry_count"));
    }

    // === Thread safety of the sealed cache ===

    static_assertions::assert_impl_all!(AggregateCache<Entry>: Send, Sync);

    #[test]
    fn test_sealed_cache_shared_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let mut cache = AggregateCache::new();
        cache.put(key(&["t:a"]), Entry::new("a")).unwrap();
        cache.put(key(&["t:a", "t:b"]), Entry::new("ab")).unwrap();
        cache.seal();
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let query = AggregateKey::for_names(["t:a", "t:b", "t:c"]);
                    let best = cache.find_best(&query).unwrap();
                    assert_eq!(best.num_bits(), 2);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
