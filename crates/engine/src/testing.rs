//! In-memory repository fixtures
//!
//! `MemoryRepository` is a builder-style `TypeRepository` used by the
//! test suites and benchmarks. It can inject a bounded number of read
//! failures to exercise the retry-once load path.

use lattice_core::def::{NodeTypeDefinition, PropertyDefinition, TypeDeclaration};
use lattice_core::{Error, PropertyKind, Result, TypeRepository, COMPOUND_BASE, DOCUMENT_BASE, SYS_BASE};
use std::sync::atomic::{AtomicU32, Ordering};

/// The standard bootstrap hierarchy fixtures share: `sys:base`,
/// `sys:document` and `sys:compound`
pub fn sys_base_definitions() -> Vec<NodeTypeDefinition> {
    let mut base = NodeTypeDefinition::new(SYS_BASE, &[]);
    base.properties.push({
        let mut id = PropertyDefinition::new("sys:id", PropertyKind::String);
        id.protected = true;
        id.auto_created = true;
        id
    });

    let document = NodeTypeDefinition::new(DOCUMENT_BASE, &[SYS_BASE]);
    let compound = NodeTypeDefinition::new(COMPOUND_BASE, &[SYS_BASE]);

    vec![base, document, compound]
}

/// In-memory `TypeRepository` with builder-style setup and failure
/// injection
#[derive(Debug, Default)]
pub struct MemoryRepository {
    node_types: Vec<NodeTypeDefinition>,
    declarations: Vec<TypeDeclaration>,
    failures: AtomicU32,
}

impl MemoryRepository {
    /// An empty repository
    pub fn new() -> Self {
        MemoryRepository::default()
    }

    /// A repository seeded with the standard bootstrap hierarchy
    pub fn with_bootstrap() -> Self {
        let mut repo = MemoryRepository::new();
        repo.node_types = sys_base_definitions();
        repo
    }

    /// Add a raw node-type definition
    pub fn with_node_type(mut self, def: NodeTypeDefinition) -> Self {
        self.node_types.push(def);
        self
    }

    /// Add a namespace type declaration
    pub fn with_declaration(mut self, decl: TypeDeclaration) -> Self {
        self.declarations.push(decl);
        self
    }

    /// Make the next `count` reads fail with a repository error
    pub fn fail_next_reads(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(Error::Repository("injected read failure".to_string()));
        }
        Ok(())
    }
}

impl TypeRepository for MemoryRepository {
    fn node_type_definitions(&self) -> Result<Vec<NodeTypeDefinition>> {
        self.check_failure()?;
        Ok(self.node_types.clone())
    }

    fn type_declarations(&self) -> Result<Vec<TypeDeclaration>> {
        self.check_failure()?;
        Ok(self.declarations.clone())
    }
}
