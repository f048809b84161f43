//! Bitset-keyed aggregate caching for Lattice
//!
//! Combinations of type names ("documentX + mixinY + mixinZ") are keyed by
//! a compact bitset over a process-wide name index. The cache supports
//! best-effort lookup of the largest already-cached subset so an N-way
//! combination can be assembled from cached sub-combinations instead of
//! being merged from scratch.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod key;

pub use cache::AggregateCache;
pub use key::AggregateKey;
