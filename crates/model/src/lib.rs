//! Type descriptors for Lattice
//!
//! This crate holds the two layers of the type model:
//! - `EffectiveNodeType` and its per-item metadata: the merged, low-level
//!   structural type derived directly from raw node-type definitions
//! - `ContentType` and its fields: the richer descriptor that wraps an
//!   effective node type and resolves declared fields against it
//!
//! Both layers follow the seal lifecycle from `lattice-core`: mutable
//! during the single-threaded cache build, immutable after `seal()`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod content_type;
pub mod field;
pub mod item;
pub mod node_type;

pub use content_type::ContentType;
pub use field::{ContentTypeField, FieldKind};
pub use item::{EffectiveChild, EffectiveItem, EffectiveProperty};
pub use node_type::EffectiveNodeType;
