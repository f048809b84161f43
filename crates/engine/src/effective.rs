//! Cache of effective node types
//!
//! Builds the merged structural type for every registered node-type
//! definition: the base definition plus everything inherited from its
//! super-types, computed depth-first over the super-type DAG. The whole
//! load is single-threaded; the finished cache is sealed and published
//! behind an `Arc`.
//!
//! Combinations of types (a node's primary type plus its mixins) are
//! served from the same bitset-keyed cache; combinations that were never
//! cached during the build are composed transiently so the sealed cache is
//! never mutated after publish.

use crate::compose::compose;
use crate::version::next_effective_version;
use lattice_aggregate::{AggregateCache, AggregateKey};
use lattice_core::{names, Error, Result, Seal, Sealable, TypeRepository};
use lattice_model::EffectiveNodeType;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Sealed snapshot of all effective node types
#[derive(Debug)]
pub struct EffectiveNodeTypesCache {
    cache: AggregateCache<EffectiveNodeType>,
    names: BTreeMap<String, AggregateKey>,
    prefixes: BTreeMap<String, BTreeSet<String>>,
    diagnostics: Vec<String>,
    version: u64,
    seal: Seal,
}

impl EffectiveNodeTypesCache {
    /// Load a snapshot from the repository.
    ///
    /// A repository access failure triggers exactly one retry of the whole
    /// load; a second failure propagates.
    pub fn load<R: TypeRepository>(repository: &R) -> Result<Self> {
        match Self::try_load(repository) {
            Ok(cache) => Ok(cache),
            Err(Error::Repository(msg)) => {
                warn!(
                    target: "lattice::engine",
                    error = %msg,
                    "Effective node type load failed, retrying once"
                );
                Self::try_load(repository)
            }
            Err(err) => Err(err),
        }
    }

    fn try_load<R: TypeRepository>(repository: &R) -> Result<Self> {
        let definitions = repository.node_type_definitions()?;

        let mut this = EffectiveNodeTypesCache {
            cache: AggregateCache::new(),
            names: BTreeMap::new(),
            prefixes: BTreeMap::new(),
            diagnostics: Vec::new(),
            version: next_effective_version(),
            seal: Seal::new(),
        };

        // Base (non-merged) types, first definition wins per name
        let mut bases: BTreeMap<String, EffectiveNodeType> = BTreeMap::new();
        for def in &definitions {
            if bases.contains_key(&def.name) {
                this.diagnostics.push(format!(
                    "duplicate node type definition {}, first wins",
                    def.name
                ));
                continue;
            }
            bases.insert(def.name.clone(), EffectiveNodeType::from_definition(def));
        }

        let mut visiting = BTreeSet::new();
        let all_names: Vec<String> = bases.keys().cloned().collect();
        for name in &all_names {
            this.build_effective(name, &bases, &mut visiting)?;
        }

        for name in this.names.keys() {
            this.prefixes
                .entry(names::prefix_of(name).to_string())
                .or_default()
                .insert(name.clone());
        }

        this.cache.seal();
        this.seal.seal();
        info!(
            target: "lattice::engine",
            types = this.names.len(),
            version = this.version,
            "Effective node types loaded"
        );
        Ok(this)
    }

    /// Depth-first effective-type construction: base merged with the
    /// (recursively built) effective super-types
    fn build_effective(
        &mut self,
        name: &str,
        bases: &BTreeMap<String, EffectiveNodeType>,
        visiting: &mut BTreeSet<String>,
    ) -> Result<()> {
        if self.names.contains_key(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            self.diagnostics
                .push(format!("super-type cycle through {name}"));
            warn!(target: "lattice::engine", node_type = %name, "Super-type cycle");
            return Ok(());
        }

        let base = match bases.get(name) {
            Some(base) => base,
            None => {
                visiting.remove(name);
                return Ok(());
            }
        };

        let super_names: Vec<String> = base.super_types().iter().cloned().collect();
        let mut effective = base.clone();
        for sup in &super_names {
            self.build_effective(sup, bases, visiting)?;
            match self.names.get(sup).and_then(|key| self.cache.get(key)) {
                Some(sup_effective) => {
                    effective.merge(sup_effective, true)?;
                }
                None => {
                    self.diagnostics.push(format!(
                        "node type {name} references unknown super-type {sup}"
                    ));
                    warn!(
                        target: "lattice::engine",
                        node_type = %name,
                        super_type = %sup,
                        "Unknown super-type"
                    );
                }
            }
        }

        let key = self.cache.key_for_name(name);
        self.cache.put(key.clone(), effective)?;
        self.names.insert(name.to_string(), key);
        visiting.remove(name);
        debug!(target: "lattice::engine", node_type = %name, "Effective node type built");
        Ok(())
    }

    /// Snapshot version, monotonic across rebuilds
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether this snapshot has been sealed (always true once published)
    pub fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }

    /// Diagnostics recorded during the load
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Effective type for an exact name
    pub fn get(&self, name: &str) -> Option<&EffectiveNodeType> {
        self.names.get(name).and_then(|key| self.cache.get(key))
    }

    /// Whether a type of this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// All registered type names
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// All cached effective types
    pub fn types(&self) -> impl Iterator<Item = &EffectiveNodeType> {
        self.cache.values()
    }

    /// Names registered under a namespace prefix
    pub fn names_for_prefix(&self, prefix: &str) -> Option<&BTreeSet<String>> {
        self.prefixes.get(prefix)
    }

    /// Effective type for a combination of names.
    ///
    /// Cached combinations are returned by reference; anything else is
    /// composed transiently from the largest cached subsets (the sealed
    /// cache is never mutated after publish) and returned sealed.
    pub fn aggregate(&self, type_names: &[&str]) -> Result<Cow<'_, EffectiveNodeType>> {
        let key = self.cache.key_for(type_names.iter().copied());
        if key.is_empty() {
            return Err(Error::InvalidOperation(
                "aggregate of zero type names".to_string(),
            ));
        }
        if let Some(ent) = self.cache.get(&key) {
            return Ok(Cow::Borrowed(ent));
        }
        let mut composed = compose(&self.cache, &key)?;
        composed.seal();
        Ok(Cow::Owned(composed))
    }
}
