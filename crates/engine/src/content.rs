//! Cache of content types
//!
//! The top-level orchestrator: loads the namespace type declarations,
//! attaches the pre-built effective node types, resolves the super-type
//! DAG, aggregates combinations through the bitset-keyed cache, resolves
//! every field map, and seals the whole snapshot.
//!
//! The load proceeds in five ordered passes over a repository snapshot,
//! each pass assuming the prior pass's invariants:
//!
//! 1. Discover: one unresolved descriptor per explicit declaration;
//!    property-alias ("remodel") declarations only record an alias.
//! 2. Populate: build unresolved fields, property vs child decided by the
//!    declared type alias; conflicting duplicate declarations drop both
//!    sides.
//! 3. Attach: synthesize derived descriptors for effective types with no
//!    declaration; attach structural backing to declared ones; drop
//!    declarations without backing.
//! 4. Resolve/aggregate: depth-first over the super-type DAG, merging the
//!    super-type aggregate into each type, classifying by ancestry, and
//!    building separate aggregated variants for declared-but-unenforced
//!    ("soft") mixins.
//! 5. Resolve items and seal: bottom-up field resolution over the
//!    super-type chain, then one atomic seal of the snapshot.
//!
//! Unresolvable schema pieces are dropped with diagnostics: a CMS instance
//! with a partially inconsistent schema must still boot.

use crate::compose::compose;
use crate::effective::EffectiveNodeTypesCache;
use crate::version::next_content_version;
use lattice_aggregate::{AggregateCache, AggregateKey};
use lattice_core::{names, Error, NodeInfo, PropertyKind, Result, Seal, Sealable, TypeRepository};
use lattice_model::{ContentType, ContentTypeField, FieldKind};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sealed snapshot of all content types and their cached aggregates
#[derive(Debug)]
pub struct ContentTypesCache {
    effective: Arc<EffectiveNodeTypesCache>,
    cache: AggregateCache<ContentType>,
    names: BTreeMap<String, AggregateKey>,
    prefixes: BTreeMap<String, BTreeSet<String>>,
    aliases: BTreeMap<String, PropertyKind>,
    diagnostics: Vec<String>,
    version: u64,
    seal: Seal,
}

impl ContentTypesCache {
    /// Load a snapshot from the repository over a pre-built effective
    /// node-type cache.
    ///
    /// A repository access failure triggers exactly one retry of the whole
    /// five-pass load; a second failure propagates.
    pub fn load<R: TypeRepository>(
        repository: &R,
        effective: Arc<EffectiveNodeTypesCache>,
    ) -> Result<Self> {
        match Self::try_load(repository, Arc::clone(&effective)) {
            Ok(cache) => Ok(cache),
            Err(Error::Repository(msg)) => {
                warn!(
                    target: "lattice::engine",
                    error = %msg,
                    "Content type load failed, retrying once"
                );
                Self::try_load(repository, effective)
            }
            Err(err) => Err(err),
        }
    }

    fn try_load<R: TypeRepository>(
        repository: &R,
        effective: Arc<EffectiveNodeTypesCache>,
    ) -> Result<Self> {
        let declarations = repository.type_declarations()?;

        let mut this = ContentTypesCache {
            effective,
            cache: AggregateCache::new(),
            names: BTreeMap::new(),
            prefixes: BTreeMap::new(),
            aliases: BTreeMap::new(),
            diagnostics: Vec::new(),
            version: next_content_version(),
            seal: Seal::new(),
        };

        // Pass 1: discover
        let mut declared: BTreeMap<String, ContentType> = BTreeMap::new();
        for decl in &declarations {
            if let Some(kind) = decl.property_alias {
                this.aliases.insert(decl.name.clone(), kind);
                debug!(
                    target: "lattice::engine",
                    alias = %decl.name,
                    kind = %kind,
                    "Skipping property-alias declaration"
                );
                continue;
            }
            if declared.contains_key(&decl.name) {
                this.diagnostics.push(format!(
                    "duplicate type declaration {}, first wins",
                    decl.name
                ));
                continue;
            }
            declared.insert(decl.name.clone(), ContentType::from_declaration(decl));
        }

        // Pass 2: populate
        let mut populated: BTreeSet<String> = BTreeSet::new();
        for decl in &declarations {
            if decl.is_property_alias() || !populated.insert(decl.name.clone()) {
                continue;
            }
            let ct = match declared.get_mut(&decl.name) {
                Some(ct) => ct,
                None => continue,
            };
            let mut banned: BTreeSet<String> = BTreeSet::new();
            for field_decl in &decl.fields {
                if banned.contains(&field_decl.name) {
                    continue;
                }
                let kind = match PropertyKind::from_alias(&field_decl.field_type)
                    .or_else(|| this.aliases.get(&field_decl.field_type).copied())
                {
                    Some(kind) => FieldKind::Property(kind),
                    None => FieldKind::Child,
                };
                let existing = ct
                    .properties()
                    .get(&field_decl.name)
                    .or_else(|| ct.children().get(&field_decl.name));
                if let Some(existing) = existing {
                    let same_shape = existing.kind() == kind
                        && existing.item_type() == field_decl.field_type
                        && existing.is_multiple() == field_decl.multiple;
                    if same_shape {
                        this.diagnostics.push(format!(
                            "type {}: duplicate declaration of field {} ignored",
                            decl.name, field_decl.name
                        ));
                        continue;
                    }
                    // Incompatible same-name declarations: drop both
                    // rather than guess at the shape
                    ct.remove_field(&field_decl.name)?;
                    banned.insert(field_decl.name.clone());
                    warn!(
                        target: "lattice::engine",
                        content_type = %decl.name,
                        field = %field_decl.name,
                        "Conflicting duplicate field declarations, dropping both"
                    );
                    this.diagnostics.push(format!(
                        "type {}: conflicting declarations for field {}, both dropped",
                        decl.name, field_decl.name
                    ));
                    continue;
                }
                ct.add_field(ContentTypeField::from_declaration(
                    field_decl, &decl.name, kind,
                ))?;
            }
        }

        // Pass 3: attach effective types
        let ent_names: Vec<String> = this.effective.type_names().map(str::to_string).collect();
        for name in &ent_names {
            let registry_ent = match this.effective.get(name) {
                Some(ent) => ent.unsealed_copy(),
                None => continue,
            };
            match declared.get_mut(name) {
                Some(ct) => ct.set_ent(registry_ent)?,
                None => {
                    declared.insert(name.clone(), ContentType::derived_from(registry_ent));
                }
            }
        }
        declared.retain(|name, ct| {
            if ct.ent().is_some() {
                true
            } else {
                warn!(
                    target: "lattice::engine",
                    content_type = %name,
                    "Declared type has no effective node type, dropped"
                );
                this.diagnostics
                    .push(format!("declared type {name} has no effective node type, dropped"));
                false
            }
        });

        for (name, ct) in declared {
            let key = this.cache.key_for_name(&name);
            this.cache.put(key.clone(), ct)?;
            this.names.insert(name, key);
        }

        // Pass 4: resolve/aggregate over the super-type DAG
        let all_names: Vec<String> = this.names.keys().cloned().collect();
        let mut resolved = BTreeSet::new();
        let mut visiting = BTreeSet::new();
        for name in &all_names {
            this.resolve_super_types(name, &mut resolved, &mut visiting)?;
        }

        // Pass 5: resolve items bottom-up, then seal the whole snapshot
        this.resolve_all_items()?;

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
            aggregates = this.cache.len(),
            version = this.version,
            "Content types loaded"
        );
        Ok(this)
    }

    /// Pass 4 worker: depth-first super-type resolution for one type
    fn resolve_super_types(
        &mut self,
        name: &str,
        resolved: &mut BTreeSet<String>,
        visiting: &mut BTreeSet<String>,
    ) -> Result<()> {
        if resolved.contains(name) {
            return Ok(());
        }
        let key = match self.names.get(name) {
            Some(key) => key.clone(),
            None => return Ok(()),
        };
        if !visiting.insert(name.to_string()) {
            self.diagnostics
                .push(format!("super-type cycle through {name}"));
            warn!(target: "lattice::engine", content_type = %name, "Super-type cycle");
            return Ok(());
        }

        let declared_supers: Vec<String> = match self.cache.get(&key) {
            Some(ct) => ct.declared_super_types().to_vec(),
            None => {
                visiting.remove(name);
                return Ok(());
            }
        };
        for sup in &declared_supers {
            self.resolve_super_types(sup, resolved, visiting)?;
        }

        let mut known_supers: BTreeSet<String> = BTreeSet::new();
        for sup in &declared_supers {
            if self.names.contains_key(sup) {
                known_supers.insert(sup.clone());
            } else {
                self.diagnostics
                    .push(format!("type {name} references unknown super-type {sup}"));
                warn!(
                    target: "lattice::engine",
                    content_type = %name,
                    super_type = %sup,
                    "Unknown super-type"
                );
            }
        }

        // Soft mixins: declared super-types the registry's structural type
        // does not enforce. They are left out of the base type and carried
        // by a separate aggregated variant instead.
        let soft: BTreeSet<String> = {
            let registry_ent = self.effective.get(name);
            known_supers
                .iter()
                .filter(|sup| {
                    registry_ent.map(|ent| !ent.is_node_type(sup)).unwrap_or(false)
                        && self
                            .names
                            .get(*sup)
                            .and_then(|key| self.cache.get(key))
                            .map(|ct| ct.is_mixin())
                            .unwrap_or(false)
                })
                .cloned()
                .collect()
        };
        let hard_supers: BTreeSet<String> =
            known_supers.difference(&soft).cloned().collect();

        if !hard_supers.is_empty() {
            let supers_key = self.ensure_aggregate(&hard_supers)?;
            let mut ct = self
                .cache
                .remove(&key)?
                .ok_or_else(|| Error::UnknownType(name.to_string()))?;
            if let Some(supers_ct) = self.cache.get(&supers_key) {
                ct.merge(supers_ct, true)?;
            }
            ct.classify()?;
            self.cache.put(key.clone(), ct)?;
        } else if let Some(ct) = self.cache.get_mut(&key)? {
            ct.classify()?;
        }

        if !soft.is_empty() {
            let mut variant_names = soft.clone();
            variant_names.insert(name.to_string());
            let variant_key = self.ensure_aggregate(&variant_names)?;
            debug!(
                target: "lattice::engine",
                content_type = %name,
                variant = %variant_key,
                "Built soft-mixin aggregate variant"
            );
        }

        visiting.remove(name);
        resolved.insert(name.to_string());
        Ok(())
    }

    /// Compose and cache the combination of `names` if it is not cached
    /// yet; returns its key
    fn ensure_aggregate(&mut self, names: &BTreeSet<String>) -> Result<AggregateKey> {
        let key = self.cache.key_for(names.iter().map(String::as_str));
        if self.cache.contains_key(&key) {
            return Ok(key);
        }
        let mut composed = compose(&self.cache, &key)?;
        composed.classify()?;
        self.cache.put(key.clone(), composed)?;
        Ok(key)
    }

    /// Pass 5 worker: resolve every cached entry's field maps, supers
    /// first
    fn resolve_all_items(&mut self) -> Result<()> {
        let keys = self.cache.keys();
        let mut done: BTreeSet<AggregateKey> = BTreeSet::new();
        let mut in_progress: BTreeSet<AggregateKey> = BTreeSet::new();
        for key in &keys {
            self.resolve_items_for(key, &mut done, &mut in_progress)?;
        }
        Ok(())
    }

    fn resolve_items_for(
        &mut self,
        key: &AggregateKey,
        done: &mut BTreeSet<AggregateKey>,
        in_progress: &mut BTreeSet<AggregateKey>,
    ) -> Result<()> {
        if done.contains(key) || !in_progress.insert(key.clone()) {
            return Ok(());
        }

        let super_names: Vec<String> = match self.cache.get(key) {
            Some(ct) => ct.super_types().iter().cloned().collect(),
            None => {
                in_progress.remove(key);
                return Ok(());
            }
        };
        for sup in &super_names {
            if let Some(sup_key) = self.names.get(sup).cloned() {
                if &sup_key != key {
                    self.resolve_items_for(&sup_key, done, in_progress)?;
                }
            }
        }

        let mut ct = match self.cache.remove(key)? {
            Some(ct) => ct,
            None => {
                in_progress.remove(key);
                return Ok(());
            }
        };
        let mut diagnostics = Vec::new();
        {
            let supers: Vec<&ContentType> = super_names
                .iter()
                .filter_map(|sup| self.names.get(sup))
                .filter_map(|sup_key| self.cache.get(sup_key))
                .collect();
            let effective = &self.effective;
            let is_subtype = |sub: &str, ancestor: &str| {
                effective
                    .get(sub)
                    .map(|ent| ent.is_node_type(ancestor))
                    .unwrap_or(false)
            };
            ct.resolve_items(&supers, &is_subtype, &mut diagnostics)?;
        }
        self.diagnostics.append(&mut diagnostics);
        self.cache.put(key.clone(), ct)?;
        in_progress.remove(key);
        done.insert(key.clone());
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

    /// The effective node-type cache this snapshot was built over
    pub fn effective_node_types(&self) -> &Arc<EffectiveNodeTypesCache> {
        &self.effective
    }

    /// Content type for an exact name
    pub fn get(&self, name: &str) -> Option<&ContentType> {
        self.names.get(name).and_then(|key| self.cache.get(key))
    }

    /// Whether a type of this name is known
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// All known simple type names
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// All cached descriptors, aggregates included
    pub fn types(&self) -> impl Iterator<Item = &ContentType> {
        self.cache.values()
    }

    /// Names registered under a namespace prefix
    pub fn names_for_prefix(&self, prefix: &str) -> Option<&BTreeSet<String>> {
        self.prefixes.get(prefix)
    }

    /// Property aliases recorded from "remodel" declarations
    pub fn property_aliases(&self) -> &BTreeMap<String, PropertyKind> {
        &self.aliases
    }

    /// Content type for a combination of names.
    ///
    /// Cached combinations are returned by reference; anything else is
    /// composed transiently from the largest cached subsets (the sealed
    /// cache is never mutated after publish) and returned sealed.
    pub fn aggregate(&self, type_names: &[&str]) -> Result<Cow<'_, ContentType>> {
        let key = self.cache.key_for(type_names.iter().copied());
        if key.is_empty() {
            return Err(Error::InvalidOperation(
                "aggregate of zero type names".to_string(),
            ));
        }
        if let Some(ct) = self.cache.get(&key) {
            return Ok(Cow::Borrowed(ct));
        }
        let mut composed = compose(&self.cache, &key)?;
        composed.classify()?;
        composed.seal();
        Ok(Cow::Owned(composed))
    }

    /// Content type for a live node: its primary type plus mixins
    pub fn for_node(&self, node: &dyn NodeInfo) -> Result<Cow<'_, ContentType>> {
        let mixins = node.mixin_types();
        let mut type_names: Vec<&str> = Vec::with_capacity(1 + mixins.len());
        type_names.push(node.primary_type());
        type_names.extend(mixins.iter().map(String::as_str));
        self.aggregate(&type_names)
    }
}
