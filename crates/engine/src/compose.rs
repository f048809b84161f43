//! Greedy composition of uncached type combinations
//!
//! An N-way combination is assembled by repeatedly looking up the largest
//! already-cached subset of the remaining names, merging it in, and
//! subtracting its key from the remainder. Greedy, not globally optimal;
//! with every single type cached the loop always terminates, and an
//! unknown name surfaces as `Error::UnknownType`.

use lattice_aggregate::{AggregateCache, AggregateKey};
use lattice_core::{Error, Result};
use lattice_model::{ContentType, EffectiveNodeType};

/// Descriptors that can seed and absorb component merges
pub(crate) trait Composable: Sized {
    fn unsealed_copy(&self) -> Self;
    fn merge_component(&mut self, other: &Self) -> Result<bool>;
}

impl Composable for EffectiveNodeType {
    fn unsealed_copy(&self) -> Self {
        EffectiveNodeType::unsealed_copy(self)
    }
    fn merge_component(&mut self, other: &Self) -> Result<bool> {
        self.merge(other, false)
    }
}

impl Composable for ContentType {
    fn unsealed_copy(&self) -> Self {
        ContentType::unsealed_copy(self)
    }
    fn merge_component(&mut self, other: &Self) -> Result<bool> {
        self.merge(other, false)
    }
}

/// Compose the combination `key` from cached entries
pub(crate) fn compose<T: Composable>(
    cache: &AggregateCache<T>,
    key: &AggregateKey,
) -> Result<T> {
    let mut remainder = key.clone();
    let mut result: Option<T> = None;

    while !remainder.is_empty() {
        let part_key = if cache.contains_key(&remainder) {
            remainder.clone()
        } else {
            match cache.find_best(&remainder) {
                Some(best) => best,
                None => return Err(Error::UnknownType(remainder.names().join(","))),
            }
        };
        let part = cache
            .get(&part_key)
            .ok_or_else(|| Error::UnknownType(part_key.names().join(",")))?;

        match result.as_mut() {
            None => result = Some(part.unsealed_copy()),
            Some(acc) => {
                acc.merge_component(part)?;
            }
        }
        remainder = remainder.subtract(&part_key);
    }

    result.ok_or_else(|| Error::InvalidOperation("aggregate of zero type names".to_string()))
}
