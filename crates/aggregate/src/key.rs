//! Compact bitset keys over the process-wide type-name index
//!
//! Every distinct type name observed by any key is assigned a bit position
//! in a global append-only table. The table only grows: positions are never
//! reused or reclaimed, so a key remains valid for the process lifetime and
//! keys built by independent caches are directly comparable.
//!
//! Two keys are equal iff they denote the same exact set of type names.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;

static NAME_INDEX: Lazy<RwLock<NameIndex>> = Lazy::new(|| RwLock::new(NameIndex::default()));

/// Append-only name → bit-position table. Init-only lifecycle, no teardown.
#[derive(Default)]
struct NameIndex {
    positions: FxHashMap<String, usize>,
    names: Vec<String>,
}

impl NameIndex {
    fn intern(&mut self, name: &str) -> usize {
        if let Some(&pos) = self.positions.get(name) {
            return pos;
        }
        let pos = self.names.len();
        self.names.push(name.to_string());
        self.positions.insert(name.to_string(), pos);
        pos
    }

    fn name_at(&self, pos: usize) -> Option<&str> {
        self.names.get(pos).map(String::as_str)
    }
}

/// Immutable bitset key denoting a set of type names
///
/// Word storage is canonical: trailing zero words are trimmed, so `Eq` and
/// `Hash` over the words coincide with set equality.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    words: Vec<u64>,
    bits: u32,
}

impl AggregateKey {
    /// The empty key (no names)
    pub fn empty() -> Self {
        AggregateKey {
            words: Vec::new(),
            bits: 0,
        }
    }

    /// Key for a single type name
    pub fn for_name(name: &str) -> Self {
        Self::for_names([name])
    }

    /// Key for a set of type names. Unseen names are assigned new bit
    /// positions; duplicates collapse.
    pub fn for_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Borrow<str>,
    {
        let mut index = NAME_INDEX.write();
        let mut words: Vec<u64> = Vec::new();
        for name in names {
            let pos = index.intern(name.borrow());
            let word = pos / 64;
            if words.len() <= word {
                words.resize(word + 1, 0);
            }
            words[word] |= 1u64 << (pos % 64);
        }
        Self::from_words(words)
    }

    fn from_words(mut words: Vec<u64>) -> Self {
        while words.last() == Some(&0) {
            words.pop();
        }
        let bits = words.iter().map(|w| w.count_ones()).sum();
        AggregateKey { words, bits }
    }

    /// Number of names in this key (popcount)
    pub fn num_bits(&self) -> u32 {
        self.bits
    }

    /// Whether this key denotes no names
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Whether `other`'s names are a subset of this key's names
    pub fn contains(&self, other: &AggregateKey) -> bool {
        // Words are trimmed: a longer word vector has a set bit beyond ours
        if other.words.len() > self.words.len() {
            return false;
        }
        other
            .words
            .iter()
            .zip(&self.words)
            .all(|(o, s)| o & !s == 0)
    }

    /// The names in this key but not in `other`
    pub fn subtract(&self, other: &AggregateKey) -> AggregateKey {
        let words = self
            .words
            .iter()
            .enumerate()
            .map(|(i, s)| s & !other.words.get(i).copied().unwrap_or(0))
            .collect();
        Self::from_words(words)
    }

    /// The type names this key denotes, in bit-position order
    pub fn names(&self) -> Vec<String> {
        let index = NAME_INDEX.read();
        let mut out = Vec::with_capacity(self.bits as usize);
        for (wi, w) in self.words.iter().enumerate() {
            let mut word = *w;
            while word != 0 {
                let pos = wi * 64 + word.trailing_zeros() as usize;
                if let Some(name) = index.name_at(pos) {
                    out.push(name.to_string());
                }
                word &= word - 1;
            }
        }
        out
    }
}

impl Ord for AggregateKey {
    /// More bits first; ties broken lexicographically by word from the
    /// high end (larger high word first). Iterating a `BTreeSet` of keys
    /// therefore visits the most specific combinations first.
    fn cmp(&self, other: &Self) -> Ordering {
        match other.bits.cmp(&self.bits) {
            Ordering::Equal => {}
            ord => return ord,
        }
        if self.words.len() != other.words.len() {
            return other.words.len().cmp(&self.words.len());
        }
        for i in (0..self.words.len()).rev() {
            match other.words[i].cmp(&self.words[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for AggregateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateKey")
            .field("names", &self.names())
            .field("bits", &self.bits)
            .finish()
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    // === Construction ===

    #[test]
    fn test_empty_key() {
        let key = AggregateKey::empty();
        assert_eq!(key.num_bits(), 0);
        assert!(key.is_empty());
        assert!(key.names().is_empty());
    }

    #[test]
    fn test_single_name_key() {
        let key = AggregateKey::for_name("k:alpha");
        assert_eq!(key.num_bits(), 1);
        assert_eq!(key.names(), vec!["k:alpha"]);
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let key = AggregateKey::for_names(["k:a", "k:a", "k:a"]);
        assert_eq!(key.num_bits(), 1);
    }

    #[test]
    fn test_same_set_same_key() {
        let k1 = AggregateKey::for_names(["k:x", "k:y", "k:z"]);
        let k2 = AggregateKey::for_names(["k:z", "k:x", "k:y"]);
        assert_eq!(k1, k2);
        assert_eq!(k1.num_bits(), 3);
    }

    #[test]
    fn test_different_sets_differ() {
        let k1 = AggregateKey::for_names(["k:x", "k:y"]);
        let k2 = AggregateKey::for_names(["k:x", "k:z"]);
        assert_ne!(k1, k2);
    }

    // === Subset / subtract laws ===

    #[test]
    fn test_contains_is_reflexive() {
        let key = AggregateKey::for_names(["k:a", "k:b"]);
        assert!(key.contains(&key));
    }

    #[test]
    fn test_contains_subset() {
        let big = AggregateKey::for_names(["k:a", "k:b", "k:c"]);
        let small = AggregateKey::for_names(["k:a", "k:c"]);
        assert!(big.contains(&small));
        assert!(!small.contains(&big));
    }

    #[test]
    fn test_contains_disjoint_is_false() {
        let k1 = AggregateKey::for_names(["k:d1", "k:d2"]);
        let k2 = AggregateKey::for_names(["k:d3"]);
        assert!(!k1.contains(&k2));
        assert!(!k2.contains(&k1));
    }

    #[test]
    fn test_contains_empty() {
        let key = AggregateKey::for_name("k:solo");
        assert!(key.contains(&AggregateKey::empty()));
        assert!(!AggregateKey::empty().contains(&key));
    }

    #[test]
    fn test_subtract_self_is_empty() {
        let key = AggregateKey::for_names(["k:a", "k:b", "k:c"]);
        assert_eq!(key.subtract(&key).num_bits(), 0);
    }

    #[test]
    fn test_subtract_removes_names() {
        let big = AggregateKey::for_names(["k:a", "k:b", "k:c"]);
        let part = AggregateKey::for_names(["k:b"]);
        let rest = big.subtract(&part);
        assert_eq!(rest, AggregateKey::for_names(["k:a", "k:c"]));
        assert_eq!(rest.num_bits(), 2);
    }

    #[test]
    fn test_subtract_disjoint_is_identity() {
        let key = AggregateKey::for_names(["k:a", "k:b"]);
        let other = AggregateKey::for_name("k:elsewhere");
        assert_eq!(key.subtract(&other), key);
    }

    // === Ordering ===

    #[test]
    fn test_more_bits_sorts_first() {
        let two = AggregateKey::for_names(["k:o1", "k:o2"]);
        let one = AggregateKey::for_name("k:o1");
        assert!(two < one);

        let mut set = BTreeSet::new();
        set.insert(one.clone());
        set.insert(two.clone());
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(ordered, vec![two, one]);
    }

    #[test]
    fn test_equal_keys_compare_equal() {
        let k1 = AggregateKey::for_names(["k:e1", "k:e2"]);
        let k2 = AggregateKey::for_names(["k:e2", "k:e1"]);
        assert_eq!(k1.cmp(&k2), Ordering::Equal);
    }

    #[test]
    fn test_ordering_total_over_same_bit_count() {
        let k1 = AggregateKey::for_names(["k:t1", "k:t2"]);
        let k2 = AggregateKey::for_names(["k:t1", "k:t3"]);
        assert_ne!(k1.cmp(&k2), Ordering::Equal);
        assert_eq!(k1.cmp(&k2), k2.cmp(&k1).reverse());
    }

    // === Display / Debug ===

    #[test]
    fn test_display_joins_names() {
        let key = AggregateKey::for_names(["k:p", "k:q"]);
        let shown = key.to_string();
        assert!(shown.contains("k:p"));
        assert!(shown.contains("k:q"));
        assert!(shown.contains(','));
    }

    // === Property-based laws ===

    fn name_set() -> impl Strategy<Value = BTreeSet<String>> {
        proptest::collection::btree_set("pk:[a-f][a-f]", 0..8)
    }

    proptest! {
        #[test]
        fn prop_contains_iff_subset(a in name_set(), b in name_set()) {
            let ka = AggregateKey::for_names(a.iter().map(String::as_str));
            let kb = AggregateKey::for_names(b.iter().map(String::as_str));
            prop_assert_eq!(ka.contains(&kb), b.is_subset(&a));
        }

        #[test]
        fn prop_subtract_matches_set_difference(a in name_set(), b in name_set()) {
            let ka = AggregateKey::for_names(a.iter().map(String::as_str));
            let kb = AggregateKey::for_names(b.iter().map(String::as_str));
            let diff: BTreeSet<String> = a.difference(&b).cloned().collect();
            let kd = AggregateKey::for_names(diff.iter().map(String::as_str));
            prop_assert_eq!(ka.subtract(&kb), kd);
        }

        #[test]
        fn prop_num_bits_is_set_size(a in name_set()) {
            let ka = AggregateKey::for_names(a.iter().map(String::as_str));
            prop_assert_eq!(ka.num_bits() as usize, a.len());
        }

        #[test]
        fn prop_names_round_trip(a in name_set()) {
            let ka = AggregateKey::for_names(a.iter().map(String::as_str));
            let back: BTreeSet<String> = ka.names().into_iter().collect();
            prop_assert_eq!(back, a);
        }
    }
}
