//! Lattice - content-type aggregation and caching engine
//!
//! Lattice merges independently defined type declarations (super-types,
//! mixins, raw node-type definitions) into consistent, immutable
//! aggregated type descriptors over an in-memory snapshot of repository
//! metadata.
//!
//! # Quick Start
//!
//! ```
//! use lattice::testing::MemoryRepository;
//! use lattice::def::{FieldDeclaration, NodeTypeDefinition, PropertyDefinition, TypeDeclaration};
//! use lattice::{ContentTypeService, PropertyKind};
//!
//! let mut news_nt = NodeTypeDefinition::new("ns:news", &["sys:document"]);
//! news_nt.properties.push(PropertyDefinition::new("title", PropertyKind::String));
//!
//! let mut news_decl = TypeDeclaration::new("ns:news", &["sys:document"]);
//! news_decl.fields.push(FieldDeclaration::new("title", "String"));
//!
//! let repository = MemoryRepository::with_bootstrap()
//!     .with_node_type(news_nt)
//!     .with_declaration(news_decl);
//!
//! let service = ContentTypeService::new(repository);
//! let types = service.content_types()?;
//! let news = types.get("ns:news").unwrap();
//! assert!(news.is_document_type());
//! # Ok::<(), lattice::Error>(())
//! ```
//!
//! # Architecture
//!
//! Caches are built single-threaded from a repository snapshot, sealed,
//! and published behind `Arc`s; any number of reader threads can query a
//! sealed snapshot without synchronization. Invalidation discards the
//! whole snapshot; the next access rebuilds.

// Re-export the public API of the member crates
pub use lattice_aggregate::{AggregateCache, AggregateKey};
pub use lattice_core::*;
pub use lattice_engine::*;
pub use lattice_model::*;

pub use lattice_engine::testing;
