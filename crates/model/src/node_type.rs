//! The merged, low-level structural type
//!
//! An `EffectiveNodeType` is derived directly from raw node-type
//! definitions: its own declared items plus everything merged in from its
//! super-types, and (for aggregates) from the other component types of a
//! combination. Property and child maps hold lists per name because
//! multiple definitions may share one name; disambiguation happens later
//! at the content-type layer.

use crate::item::{EffectiveChild, EffectiveItem, EffectiveProperty};
use lattice_core::def::NodeTypeDefinition;
use lattice_core::{names, Result, Seal, Sealable};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Merged structural type over one or more node-type definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveNodeType {
    /// Simple name of the first/only component type
    name: String,
    super_types: BTreeSet<String>,
    /// Component type names of this possibly-merged type, own name included
    aggregated_types: BTreeSet<String>,
    aggregate: bool,
    mixin: bool,
    abstract_type: bool,
    ordered: bool,
    primary_item: Option<String>,
    properties: BTreeMap<String, Vec<EffectiveProperty>>,
    children: BTreeMap<String, Vec<EffectiveChild>>,
    seal: Seal,
}

impl EffectiveNodeType {
    /// Build the base (non-merged) type for one raw definition.
    ///
    /// Every item's defining type is the definition's own name; super-type
    /// items are brought in later by `merge`.
    pub fn from_definition(def: &NodeTypeDefinition) -> Self {
        let mut properties: BTreeMap<String, Vec<EffectiveProperty>> = BTreeMap::new();
        for prop in &def.properties {
            properties
                .entry(prop.name.clone())
                .or_default()
                .push(EffectiveProperty::from_definition(prop, &def.name));
        }
        let mut children: BTreeMap<String, Vec<EffectiveChild>> = BTreeMap::new();
        for child in &def.children {
            children
                .entry(child.name.clone())
                .or_default()
                .push(EffectiveChild::from_definition(child, &def.name));
        }
        EffectiveNodeType {
            name: def.name.clone(),
            super_types: def.super_types.iter().cloned().collect(),
            aggregated_types: [def.name.clone()].into_iter().collect(),
            aggregate: false,
            mixin: def.mixin,
            abstract_type: def.abstract_type,
            ordered: def.orderable,
            primary_item: def.primary_item.clone(),
            properties,
            children,
            seal: Seal::new(),
        }
    }

    /// Type name: the simple name for plain types, the sorted comma-joined
    /// component names for aggregates
    pub fn name(&self) -> Cow<'_, str> {
        if self.aggregate {
            Cow::Owned(
                self.aggregated_types
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(","),
            )
        } else {
            Cow::Borrowed(&self.name)
        }
    }

    /// Namespace prefix of the simple name; empty for aggregates
    pub fn prefix(&self) -> &str {
        if self.aggregate {
            ""
        } else {
            names::prefix_of(&self.name)
        }
    }

    /// Super-type names, transitively accumulated by merges
    pub fn super_types(&self) -> &BTreeSet<String> {
        &self.super_types
    }

    /// Component type names of this type, own name included
    pub fn aggregated_types(&self) -> &BTreeSet<String> {
        &self.aggregated_types
    }

    /// Whether this type was merged from several components
    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// Mixin type
    pub fn is_mixin(&self) -> bool {
        self.mixin
    }

    /// Abstract type
    pub fn is_abstract(&self) -> bool {
        self.abstract_type
    }

    /// Child nodes keep an explicit order
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Name of the primary item, if designated
    pub fn primary_item(&self) -> Option<&str> {
        self.primary_item.as_deref()
    }

    /// Property definitions by name; lists hold multiple same-named
    /// definitions pending disambiguation
    pub fn properties(&self) -> &BTreeMap<String, Vec<EffectiveProperty>> {
        &self.properties
    }

    /// Child definitions by name
    pub fn children(&self) -> &BTreeMap<String, Vec<EffectiveChild>> {
        &self.children
    }

    /// Property definitions under one name
    pub fn properties_named(&self, name: &str) -> &[EffectiveProperty] {
        self.properties.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Child definitions under one name
    pub fn children_named(&self, name: &str) -> &[EffectiveChild] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reflexive/transitive type test over the component and super-type
    /// names
    pub fn is_node_type(&self, type_name: &str) -> bool {
        self.name == type_name
            || self.aggregated_types.contains(type_name)
            || self.super_types.contains(type_name)
    }

    /// Whether every component of `other` already passes `is_node_type`
    pub fn contains(&self, other: &EffectiveNodeType) -> bool {
        other
            .aggregated_types
            .iter()
            .all(|name| self.is_node_type(name))
    }

    /// Merge `other` into this type.
    ///
    /// Rejected with `Ok(false)` when this type already transitively
    /// contains `other` (idempotence under redundant merges). Otherwise
    /// every property/child definition of `other` not already covered by
    /// this type's own chain is appended to the per-name lists, and
    /// `other`'s component names become super-type names (`super_type` =
    /// true, "this EXTENDS these types") or additional aggregated names
    /// (false, "this IS ALSO these types"). `ordered` and the primary item
    /// propagate first-wins.
    pub fn merge(&mut self, other: &EffectiveNodeType, super_type: bool) -> Result<bool> {
        self.seal.check_unsealed("EffectiveNodeType")?;
        if self.contains(other) {
            return Ok(false);
        }

        // Item copy first: the covered-by-own-chain test must see the
        // pre-merge type names.
        for (name, defs) in &other.properties {
            for def in defs {
                if !self.is_node_type(def.defining_type()) {
                    let mut copy = def.clone();
                    copy.reopen();
                    self.properties.entry(name.clone()).or_default().push(copy);
                }
            }
        }
        for (name, defs) in &other.children {
            for def in defs {
                if !self.is_node_type(def.defining_type()) {
                    let mut copy = def.clone();
                    copy.reopen();
                    self.children.entry(name.clone()).or_default().push(copy);
                }
            }
        }

        self.super_types.extend(other.super_types.iter().cloned());
        if super_type {
            self.super_types
                .extend(other.aggregated_types.iter().cloned());
        } else {
            self.aggregated_types
                .extend(other.aggregated_types.iter().cloned());
            self.aggregate = true;
        }

        if !self.ordered {
            self.ordered = other.ordered;
        }
        if self.primary_item.is_none() {
            self.primary_item = other.primary_item.clone();
        }
        Ok(true)
    }

    /// Deep copy with all seal flags reset: the working-copy constructor
    /// for building a new aggregate from cached components
    pub fn unsealed_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.reopen();
        copy
    }

    fn reopen(&mut self) {
        self.seal.reopen();
        for defs in self.properties.values_mut() {
            for def in defs {
                def.reopen();
            }
        }
        for defs in self.children.values_mut() {
            for def in defs {
                def.reopen();
            }
        }
    }
}

impl Sealable for EffectiveNodeType {
    fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }

    fn seal(&mut self) {
        if self.seal.seal() {
            for defs in self.properties.values_mut() {
                for def in defs {
                    def.seal();
                }
            }
            for defs in self.children.values_mut() {
                for def in defs {
                    def.seal();
                }
            }
        }
    }
}
