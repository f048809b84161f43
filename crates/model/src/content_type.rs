//! The high-level content-type descriptor
//!
//! A `ContentType` wraps an `EffectiveNodeType` and resolves its own field
//! maps against it. It is created either from an explicit declaration (the
//! structural backing is attached later) or derived directly from an
//! effective node type when no declaration exists.
//!
//! Field resolution runs in three ordered stages: inherited items are
//! pulled from resolved super-types, declared items are matched against
//! the possibly multiple same-named structural definitions, and leftovers
//! are matched against the residual `"*"` definitions. Unresolvable fields
//! are dropped with a diagnostic; a partially inconsistent schema still
//! loads.

use crate::field::{ContentTypeField, FieldKind};
use crate::item::EffectiveItem;
use crate::node_type::EffectiveNodeType;
use indexmap::IndexMap;
use lattice_core::def::TypeDeclaration;
use lattice_core::{names, Error, Result, Seal, Sealable, COMPOUND_BASE, DOCUMENT_BASE, RESIDUAL};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::warn;

/// Subtype test provided by the cache layer: `is_subtype(sub, ancestor)`
pub type SubtypeCheck<'a> = &'a dyn Fn(&str, &str) -> bool;

/// Rich type descriptor layered over an effective node type
#[derive(Debug, Clone, PartialEq)]
pub struct ContentType {
    name: String,
    declared_super_types: Vec<String>,
    super_types: BTreeSet<String>,
    document_type: bool,
    compound_type: bool,
    mixin: bool,
    cascade_validate: bool,
    derived: bool,
    aggregate: bool,
    validators: Vec<String>,
    properties: IndexMap<String, ContentTypeField>,
    children: IndexMap<String, ContentTypeField>,
    ent: Option<EffectiveNodeType>,
    seal: Seal,
}

impl ContentType {
    /// Build an unresolved type from an explicit declaration.
    ///
    /// Fields are populated separately by the loader; the structural
    /// backing is attached once the effective node types are known.
    pub fn from_declaration(decl: &TypeDeclaration) -> Self {
        ContentType {
            name: decl.name.clone(),
            declared_super_types: decl.super_types.clone(),
            // The effective super set comes from the structural backing
            // and merges; a declared-but-unenforced mixin must not leak
            // into inheritance.
            super_types: BTreeSet::new(),
            document_type: false,
            compound_type: false,
            mixin: decl.mixin,
            cascade_validate: decl.cascade_validate,
            derived: false,
            aggregate: false,
            validators: decl.validators.clone(),
            properties: IndexMap::new(),
            children: IndexMap::new(),
            ent: None,
            seal: Seal::new(),
        }
    }

    /// Derive a type directly from an effective node type, with no
    /// explicit declaration. Fields come verbatim from the structural
    /// items; residual definitions produce no fields of their own.
    pub fn derived_from(ent: EffectiveNodeType) -> Self {
        let mut properties = IndexMap::new();
        for (name, defs) in ent.properties() {
            if names::is_residual(name) {
                continue;
            }
            if let Some(def) = defs.first() {
                properties.insert(name.clone(), ContentTypeField::from_effective_property(def));
            }
        }
        let mut children = IndexMap::new();
        for (name, defs) in ent.children() {
            if names::is_residual(name) {
                continue;
            }
            if let Some(def) = defs.first() {
                children.insert(name.clone(), ContentTypeField::from_effective_child(def));
            }
        }
        let mixin = ent.is_mixin();
        ContentType {
            name: ent.name().into_owned(),
            declared_super_types: Vec::new(),
            super_types: ent.super_types().clone(),
            document_type: !mixin && ent.is_node_type(DOCUMENT_BASE),
            compound_type: ent.is_node_type(COMPOUND_BASE),
            mixin,
            cascade_validate: false,
            derived: true,
            aggregate: ent.is_aggregate(),
            validators: Vec::new(),
            properties,
            children,
            ent: Some(ent),
            seal: Seal::new(),
        }
    }

    /// Type name: the simple name, or the sorted comma-joined component
    /// names for aggregates
    pub fn name(&self) -> Cow<'_, str> {
        match &self.ent {
            Some(ent) if ent.is_aggregate() => ent.name(),
            _ => Cow::Borrowed(&self.name),
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

    /// Super-type names as declared, in declaration order
    pub fn declared_super_types(&self) -> &[String] {
        &self.declared_super_types
    }

    /// Effective super-type names
    pub fn super_types(&self) -> &BTreeSet<String> {
        &self.super_types
    }

    /// Component type names of this type, own name included
    pub fn aggregated_types(&self) -> BTreeSet<String> {
        match &self.ent {
            Some(ent) => ent.aggregated_types().clone(),
            None => [self.name.clone()].into_iter().collect(),
        }
    }

    /// Whether this descriptor was merged from several components
    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// Classified as a document type by ancestry
    pub fn is_document_type(&self) -> bool {
        self.document_type
    }

    /// Classified as a compound type by ancestry
    pub fn is_compound_type(&self) -> bool {
        self.compound_type
    }

    /// Mixin type
    pub fn is_mixin(&self) -> bool {
        self.mixin
    }

    /// Inferred purely from the node type, with no explicit declaration
    pub fn is_derived(&self) -> bool {
        self.derived
    }

    /// Validation cascades into compound children
    pub fn cascade_validate(&self) -> bool {
        self.cascade_validate
    }

    /// Type-level validator identifiers
    pub fn validators(&self) -> &[String] {
        &self.validators
    }

    /// Resolved property fields, in declaration order
    pub fn properties(&self) -> &IndexMap<String, ContentTypeField> {
        &self.properties
    }

    /// Resolved child fields, in declaration order
    pub fn children(&self) -> &IndexMap<String, ContentTypeField> {
        &self.children
    }

    /// The structural backing, once attached
    pub fn ent(&self) -> Option<&EffectiveNodeType> {
        self.ent.as_ref()
    }

    /// Attach the structural backing. Fails once sealed.
    pub fn set_ent(&mut self, ent: EffectiveNodeType) -> Result<()> {
        self.seal.check_unsealed("ContentType")?;
        self.super_types.extend(ent.super_types().iter().cloned());
        self.ent = Some(ent);
        Ok(())
    }

    /// Reflexive/transitive type test
    pub fn is_node_type(&self, type_name: &str) -> bool {
        match &self.ent {
            Some(ent) => ent.is_node_type(type_name),
            None => {
                self.name == type_name
                    || self.super_types.contains(type_name)
                    || self.declared_super_types.iter().any(|s| s == type_name)
            }
        }
    }

    /// Whether every component of `other` already passes `is_node_type`
    pub fn contains(&self, other: &ContentType) -> bool {
        other
            .aggregated_types()
            .iter()
            .all(|name| self.is_node_type(name))
    }

    /// Whether a field of this name exists, as property or child
    pub fn has_field(&self, name: &str) -> bool {
        self.properties.contains_key(name) || self.children.contains_key(name)
    }

    /// Add a field, routed to the property or child map by its kind.
    ///
    /// Fails on duplicate names; the loader resolves conflicts before
    /// inserting.
    pub fn add_field(&mut self, field: ContentTypeField) -> Result<()> {
        self.seal.check_unsealed("ContentType")?;
        if self.has_field(field.name()) {
            return Err(Error::InvalidOperation(format!(
                "duplicate field {} on type {}",
                field.name(),
                self.name
            )));
        }
        let name = field.name().to_string();
        if field.is_property() {
            self.properties.insert(name, field);
        } else {
            self.children.insert(name, field);
        }
        Ok(())
    }

    /// Remove a field by name from whichever map holds it
    pub fn remove_field(&mut self, name: &str) -> Result<Option<ContentTypeField>> {
        self.seal.check_unsealed("ContentType")?;
        if let Some(field) = self.properties.shift_remove(name) {
            return Ok(Some(field));
        }
        Ok(self.children.shift_remove(name))
    }

    /// Set the cascade-validate flag. Fails once sealed.
    pub fn set_cascade_validate(&mut self, cascade: bool) -> Result<()> {
        self.seal.check_unsealed("ContentType")?;
        self.cascade_validate = cascade;
        Ok(())
    }

    /// Append a type-level validator. Fails once sealed.
    pub fn push_validator(&mut self, validator: String) -> Result<()> {
        self.seal.check_unsealed("ContentType")?;
        self.validators.push(validator);
        Ok(())
    }

    /// Recompute the document/compound classification from the structural
    /// backing's ancestry
    pub fn classify(&mut self) -> Result<()> {
        self.seal.check_unsealed("ContentType")?;
        if let Some(ent) = &self.ent {
            self.document_type = !self.mixin && ent.is_node_type(DOCUMENT_BASE);
            self.compound_type = ent.is_node_type(COMPOUND_BASE);
        }
        Ok(())
    }

    /// Merge `other` into this descriptor.
    ///
    /// No-op (`Ok(false)`) when this type already contains `other`.
    /// Otherwise fields not covered by this type's own chain are copied
    /// first-wins, the structural backings are merged, and the name
    /// bookkeeping follows the `super_type` flag as for
    /// [`EffectiveNodeType::merge`].
    pub fn merge(&mut self, other: &ContentType, super_type: bool) -> Result<bool> {
        self.seal.check_unsealed("ContentType")?;
        if self.contains(other) {
            return Ok(false);
        }

        // Fields first: the covered-by-own-chain test must see the
        // pre-merge type names.
        for (name, field) in &other.properties {
            if self.is_node_type(field.defining_type()) || self.has_field(name) {
                continue;
            }
            self.properties.insert(name.clone(), field.clone_unsealed());
        }
        for (name, field) in &other.children {
            if self.is_node_type(field.defining_type()) || self.has_field(name) {
                continue;
            }
            self.children.insert(name.clone(), field.clone_unsealed());
        }

        match (self.ent.as_mut(), other.ent.as_ref()) {
            (Some(ent), Some(other_ent)) => {
                ent.merge(other_ent, super_type)?;
            }
            _ => {
                return Err(Error::InvalidOperation(format!(
                    "merge of {} and {} before effective types are attached",
                    self.name, other.name
                )));
            }
        }

        self.super_types.extend(other.super_types.iter().cloned());
        if super_type {
            self.super_types.extend(other.aggregated_types());
        } else {
            self.aggregate = true;
            // An aggregate with a non-mixin component is not a mixin
            self.mixin &= other.mixin;
        }
        self.cascade_validate |= other.cascade_validate;
        for validator in &other.validators {
            if !self.validators.contains(validator) {
                self.validators.push(validator.clone());
            }
        }
        Ok(true)
    }

    /// Resolve the field maps against the structural backing.
    ///
    /// Runs the three stages in order: merge-inherited-items,
    /// map-effective-items, resolve-unmapped-items. Unresolvable fields
    /// are dropped and recorded in `diagnostics`. After this the instance
    /// is ready to seal.
    pub fn resolve_items(
        &mut self,
        resolved_supers: &[&ContentType],
        is_subtype: SubtypeCheck<'_>,
        diagnostics: &mut Vec<String>,
    ) -> Result<()> {
        self.seal.check_unsealed("ContentType")?;
        let ent = self.ent.take().ok_or_else(|| {
            Error::InvalidOperation(format!(
                "resolve_items on {} before its effective type is attached",
                self.name
            ))
        })?;

        self.merge_inherited_items(resolved_supers, diagnostics);
        let result = self
            .map_effective_items(&ent, is_subtype, diagnostics)
            .and_then(|_| self.resolve_unmapped_items(&ent, is_subtype, diagnostics));

        self.ent = Some(ent);
        result
    }

    /// Stage 1: pull non-overridden fields from resolved super-types.
    ///
    /// Property/child name collisions resolve child-wins for non-derived
    /// types; which side goes depends on resolution order when the
    /// property itself came from an ancestor.
    fn merge_inherited_items(&mut self, supers: &[&ContentType], diagnostics: &mut Vec<String>) {
        for sup in supers {
            for (name, field) in &sup.properties {
                if self.properties.contains_key(name) {
                    continue;
                }
                if self.children.contains_key(name) {
                    if !self.derived {
                        warn!(
                            target: "lattice::model",
                            content_type = %self.name,
                            field = %name,
                            "Inherited property collides with child, child wins"
                        );
                        diagnostics.push(format!(
                            "type {}: inherited property {} collides with a child, child wins",
                            self.name, name
                        ));
                    }
                    continue;
                }
                self.properties.insert(name.clone(), field.clone_unsealed());
            }
            for (name, field) in &sup.children {
                if self.children.contains_key(name) {
                    continue;
                }
                if self.properties.contains_key(name) {
                    if !self.derived {
                        warn!(
                            target: "lattice::model",
                            content_type = %self.name,
                            field = %name,
                            "Property collides with inherited child, child wins"
                        );
                        diagnostics.push(format!(
                            "type {}: property {} collides with an inherited child, child wins",
                            self.name, name
                        ));
                        self.properties.shift_remove(name);
                        self.children.insert(name.clone(), field.clone_unsealed());
                    }
                    continue;
                }
                self.children.insert(name.clone(), field.clone_unsealed());
            }
        }
    }

    /// Stage 2: match declared fields against the same-named structural
    /// definitions, promoting flags upward. Same-named definitions that
    /// are all incompatible drop the field.
    fn map_effective_items(
        &mut self,
        ent: &EffectiveNodeType,
        is_subtype: SubtypeCheck<'_>,
        diagnostics: &mut Vec<String>,
    ) -> Result<()> {
        let mut dropped: Vec<String> = Vec::new();

        for (name, field) in self.properties.iter_mut() {
            if field.is_resolved() {
                continue;
            }
            let defs = ent.properties_named(name);
            if defs.is_empty() {
                continue; // stage 3
            }
            let kind = match field.kind() {
                FieldKind::Property(kind) => kind,
                FieldKind::Child => continue,
            };
            match defs
                .iter()
                .find(|d| d.required_type() == kind && d.is_multiple() == field.is_multiple())
            {
                Some(def) => field.resolve_against_property(def)?,
                None => dropped.push(name.clone()),
            }
        }

        for (name, field) in self.children.iter_mut() {
            if field.is_resolved() {
                continue;
            }
            let defs = ent.children_named(name);
            if defs.is_empty() {
                continue; // stage 3
            }
            match defs.iter().find(|d| {
                d.is_multiple() == field.is_multiple()
                    && d.required_primary_types()
                        .iter()
                        .all(|required| child_satisfies(field.item_type(), required, is_subtype))
            }) {
                Some(def) => field.resolve_against_child(def)?,
                None => dropped.push(name.clone()),
            }
        }

        self.drop_fields(&dropped, "incompatible structural definition", diagnostics);
        Ok(())
    }

    /// Stage 3: match fields with no explicit underlying definition
    /// against the residual `"*"` definitions; drop the rest.
    fn resolve_unmapped_items(
        &mut self,
        ent: &EffectiveNodeType,
        is_subtype: SubtypeCheck<'_>,
        diagnostics: &mut Vec<String>,
    ) -> Result<()> {
        let mut dropped: Vec<String> = Vec::new();

        for (name, field) in self.properties.iter_mut() {
            if field.is_resolved() {
                continue;
            }
            let kind = match field.kind() {
                FieldKind::Property(kind) => kind,
                FieldKind::Child => continue,
            };
            match ent
                .properties_named(RESIDUAL)
                .iter()
                .find(|d| d.required_type() == kind && d.is_multiple() == field.is_multiple())
            {
                Some(def) => field.resolve_against_property(def)?,
                None => dropped.push(name.clone()),
            }
        }

        for (name, field) in self.children.iter_mut() {
            if field.is_resolved() {
                continue;
            }
            match ent.children_named(RESIDUAL).iter().find(|d| {
                d.is_multiple() == field.is_multiple()
                    && d.required_primary_types()
                        .iter()
                        .all(|required| child_satisfies(field.item_type(), required, is_subtype))
            }) {
                Some(def) => field.resolve_against_child(def)?,
                None => dropped.push(name.clone()),
            }
        }

        self.drop_fields(&dropped, "no underlying definition", diagnostics);
        Ok(())
    }

    fn drop_fields(&mut self, dropped: &[String], reason: &str, diagnostics: &mut Vec<String>) {
        for name in dropped {
            self.properties.shift_remove(name);
            self.children.shift_remove(name);
            warn!(
                target: "lattice::model",
                content_type = %self.name,
                field = %name,
                reason,
                "Dropping unresolvable field"
            );
            diagnostics.push(format!(
                "type {}: field {} dropped ({})",
                self.name, name, reason
            ));
        }
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
        for field in self.properties.values_mut() {
            field.reopen();
        }
        for field in self.children.values_mut() {
            field.reopen();
        }
        if let Some(ent) = self.ent.take() {
            self.ent = Some(ent.unsealed_copy());
        }
    }
}

impl Sealable for ContentType {
    fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }

    fn seal(&mut self) {
        if self.seal.seal() {
            for field in self.properties.values_mut() {
                field.seal();
            }
            for field in self.children.values_mut() {
                field.seal();
            }
            if let Some(ent) = self.ent.as_mut() {
                ent.seal();
            }
        }
    }
}

/// Whether a declared child type satisfies one required primary type
fn child_satisfies(declared: &str, required: &str, is_subtype: SubtypeCheck<'_>) -> bool {
    declared == required || is_subtype(declared, required)
}
