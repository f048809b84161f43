//! Content-type service: lazy cache ownership and invalidation
//!
//! The service owns the repository handle and both caches. A cache is
//! built lazily on first access after invalidation, under a single mutex,
//! so a rebuild is never concurrent with invalidation or another rebuild
//! on the same service instance. Readers receive `Arc` snapshots of fully
//! sealed caches and never observe a partially built one.
//!
//! Invalidation is coarse-grained: a structural change event under a
//! watched subtree drops the affected cache reference; the next lookup
//! triggers a full synchronous rebuild.

use crate::content::ContentTypesCache;
use crate::effective::EffectiveNodeTypesCache;
use lattice_core::{NodeInfo, Result, TypeRepository};
use lattice_model::ContentType;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Subtree holding the raw node-type definitions. Events under it
/// invalidate both caches.
pub const NODE_TYPES_SUBTREE: &str = "/system/types";

/// Subtree holding the namespace type declarations. Events under it
/// invalidate the content-type cache only.
pub const DECLARATIONS_SUBTREE: &str = "/namespaces";

/// Opaque "structural change under this subtree" notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Repository path the change happened under
    pub path: String,
}

impl ChangeEvent {
    /// Event for a change at `path`
    pub fn new(path: impl Into<String>) -> Self {
        ChangeEvent { path: path.into() }
    }
}

#[derive(Default)]
struct CacheState {
    effective: Option<Arc<EffectiveNodeTypesCache>>,
    content: Option<Arc<ContentTypesCache>>,
}

/// Owner of the repository handle and both lazily built caches
pub struct ContentTypeService<R: TypeRepository> {
    repository: R,
    state: Mutex<CacheState>,
}

impl<R: TypeRepository> ContentTypeService<R> {
    /// Create a service over a repository handle. No cache is built until
    /// first access.
    pub fn new(repository: R) -> Self {
        ContentTypeService {
            repository,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Current effective node types, building the cache if needed
    pub fn effective_node_types(&self) -> Result<Arc<EffectiveNodeTypesCache>> {
        let mut state = self.state.lock();
        self.effective_locked(&mut state)
    }

    fn effective_locked(&self, state: &mut CacheState) -> Result<Arc<EffectiveNodeTypesCache>> {
        if let Some(cache) = &state.effective {
            return Ok(Arc::clone(cache));
        }
        let cache = Arc::new(EffectiveNodeTypesCache::load(&self.repository)?);
        info!(
            target: "lattice::service",
            version = cache.version(),
            "Effective node-type cache rebuilt"
        );
        state.effective = Some(Arc::clone(&cache));
        Ok(cache)
    }

    /// Current content types, building both caches if needed
    pub fn content_types(&self) -> Result<Arc<ContentTypesCache>> {
        let mut state = self.state.lock();
        if let Some(cache) = &state.content {
            return Ok(Arc::clone(cache));
        }
        let effective = self.effective_locked(&mut state)?;
        let cache = Arc::new(ContentTypesCache::load(&self.repository, effective)?);
        info!(
            target: "lattice::service",
            version = cache.version(),
            "Content-type cache rebuilt"
        );
        state.content = Some(Arc::clone(&cache));
        Ok(cache)
    }

    /// Content type for a live node: its primary type plus mixins
    pub fn content_type_for_node(&self, node: &dyn NodeInfo) -> Result<ContentType> {
        let cache = self.content_types()?;
        Ok(cache.for_node(node)?.into_owned())
    }

    /// Handle a structural change notification.
    ///
    /// Drops the affected cache references; the next access rebuilds. The
    /// content cache depends on the effective cache, so node-type changes
    /// drop both.
    pub fn handle_change(&self, event: &ChangeEvent) {
        let mut state = self.state.lock();
        if event.path.starts_with(NODE_TYPES_SUBTREE) {
            debug!(
                target: "lattice::service",
                path = %event.path,
                "Node-type change, invalidating both caches"
            );
            state.effective = None;
            state.content = None;
        } else if event.path.starts_with(DECLARATIONS_SUBTREE) {
            debug!(
                target: "lattice::service",
                path = %event.path,
                "Declaration change, invalidating content-type cache"
            );
            state.content = None;
        }
    }

    /// Versions of the currently held caches, without triggering a rebuild
    pub fn versions(&self) -> (Option<u64>, Option<u64>) {
        let state = self.state.lock();
        (
            state.effective.as_ref().map(|c| c.version()),
            state.content.as_ref().map(|c| c.version()),
        )
    }
}
