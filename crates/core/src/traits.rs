//! Repository read contracts
//!
//! The engine operates purely in memory over snapshots supplied through
//! these traits. Implementations are expected to return full, consistent
//! snapshots from synchronous read calls; there is no incremental contract.

use crate::def::{NodeTypeDefinition, TypeDeclaration};
use crate::error::Result;

/// Session-like read handle onto the repository's type metadata
///
/// Both methods return a complete snapshot. A failure from either is
/// retried exactly once by the caches; a second failure propagates.
pub trait TypeRepository {
    /// All registered raw structural node-type definitions, residual
    /// (`"*"`) definitions included
    fn node_type_definitions(&self) -> Result<Vec<NodeTypeDefinition>>;

    /// All explicit namespace type declarations, property-alias
    /// ("remodel") declarations included
    fn type_declarations(&self) -> Result<Vec<TypeDeclaration>>;
}

impl<T: TypeRepository + ?Sized> TypeRepository for &T {
    fn node_type_definitions(&self) -> Result<Vec<NodeTypeDefinition>> {
        (**self).node_type_definitions()
    }
    fn type_declarations(&self) -> Result<Vec<TypeDeclaration>> {
        (**self).type_declarations()
    }
}

impl<T: TypeRepository + ?Sized> TypeRepository for std::sync::Arc<T> {
    fn node_type_definitions(&self) -> Result<Vec<NodeTypeDefinition>> {
        (**self).node_type_definitions()
    }
    fn type_declarations(&self) -> Result<Vec<TypeDeclaration>> {
        (**self).type_declarations()
    }
}

/// Read view of a live content node, for aggregate lookup by node
pub trait NodeInfo {
    /// The node's primary type name
    fn primary_type(&self) -> &str;

    /// The node's mixin type names
    fn mixin_types(&self) -> Vec<String>;
}
