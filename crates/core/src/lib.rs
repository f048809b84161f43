//! Core types and contracts for Lattice
//!
//! This crate defines the foundational pieces used throughout the engine:
//! - Error: error type hierarchy
//! - Seal / Sealable: the mutable-build / immutable-publish lifecycle
//! - PropertyKind: the enumerated primitive property kinds
//! - Definition structs: the repository-snapshot input shapes
//! - Traits: the repository read contracts (TypeRepository, NodeInfo)
//! - Well-known names: residual and base-type constants

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod def;
pub mod error;
pub mod kind;
pub mod names;
pub mod seal;
pub mod traits;

pub use def::{
    ChildDefinition, FieldDeclaration, NodeTypeDefinition, PropertyDefinition, TypeDeclaration,
};
pub use error::{Error, Result};
pub use kind::PropertyKind;
pub use names::{prefix_of, COMPOUND_BASE, DOCUMENT_BASE, RESIDUAL, SYS_BASE};
pub use seal::{Seal, Sealable};
pub use traits::{NodeInfo, TypeRepository};
