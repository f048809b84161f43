//! Per-property and per-child metadata of an effective node type
//!
//! Properties and children are distinct kinds sharing the common item
//! flags; the `EffectiveItem` trait exposes the shared accessors for
//! generic resolution code. Items are sealed together with the type that
//! owns them.

use lattice_core::def::{ChildDefinition, PropertyDefinition};
use lattice_core::{names, PropertyKind, Result, Seal, Sealable, SYS_BASE};
use std::collections::BTreeSet;

/// Accessors shared by property and child items
pub trait EffectiveItem {
    /// Item name, `"*"` for residual definitions
    fn name(&self) -> &str;
    /// Name of the type that declared this item
    fn defining_type(&self) -> &str;
    /// Whether this is the residual (`"*"`) definition
    fn is_residual(&self) -> bool;
    /// Multi-valued / same-name siblings allowed
    fn is_multiple(&self) -> bool;
    /// Must be present on every node of the type
    fn is_mandatory(&self) -> bool;
    /// Created automatically with the node
    fn is_auto_created(&self) -> bool;
    /// Managed by the repository
    fn is_protected(&self) -> bool;
}

/// Structural metadata of one property definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveProperty {
    name: String,
    defining_type: String,
    required_type: PropertyKind,
    multiple: bool,
    mandatory: bool,
    auto_created: bool,
    protected: bool,
    value_constraints: Vec<String>,
    default_values: Vec<String>,
    seal: Seal,
}

impl EffectiveProperty {
    /// Build from a raw definition declared by `defining_type`
    pub fn from_definition(def: &PropertyDefinition, defining_type: &str) -> Self {
        EffectiveProperty {
            name: def.name.clone(),
            defining_type: defining_type.to_string(),
            required_type: def.required_type,
            multiple: def.multiple,
            mandatory: def.mandatory,
            auto_created: def.auto_created,
            protected: def.protected,
            value_constraints: def.value_constraints.clone(),
            default_values: def.default_values.clone(),
            seal: Seal::new(),
        }
    }

    /// Primitive kind of the property value
    pub fn required_type(&self) -> PropertyKind {
        self.required_type
    }

    /// Value constraint expressions
    pub fn value_constraints(&self) -> &[String] {
        &self.value_constraints
    }

    /// Default values applied on auto-creation
    pub fn default_values(&self) -> &[String] {
        &self.default_values
    }

    /// Append a value constraint. Fails once sealed.
    pub fn push_value_constraint(&mut self, constraint: String) -> Result<()> {
        self.seal.check_unsealed("EffectiveProperty")?;
        self.value_constraints.push(constraint);
        Ok(())
    }

    /// Append a default value. Fails once sealed.
    pub fn push_default_value(&mut self, value: String) -> Result<()> {
        self.seal.check_unsealed("EffectiveProperty")?;
        self.default_values.push(value);
        Ok(())
    }

    pub(crate) fn reopen(&mut self) {
        self.seal.reopen();
    }
}

impl EffectiveItem for EffectiveProperty {
    fn name(&self) -> &str {
        &self.name
    }
    fn defining_type(&self) -> &str {
        &self.defining_type
    }
    fn is_residual(&self) -> bool {
        names::is_residual(&self.name)
    }
    fn is_multiple(&self) -> bool {
        self.multiple
    }
    fn is_mandatory(&self) -> bool {
        self.mandatory
    }
    fn is_auto_created(&self) -> bool {
        self.auto_created
    }
    fn is_protected(&self) -> bool {
        self.protected
    }
}

impl Sealable for EffectiveProperty {
    fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }
    fn seal(&mut self) {
        self.seal.seal();
    }
}

/// Structural metadata of one child-node definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveChild {
    name: String,
    defining_type: String,
    default_primary_type: Option<String>,
    required_primary_types: BTreeSet<String>,
    multiple: bool,
    mandatory: bool,
    auto_created: bool,
    protected: bool,
    seal: Seal,
}

impl EffectiveChild {
    /// Build from a raw definition declared by `defining_type`
    pub fn from_definition(def: &ChildDefinition, defining_type: &str) -> Self {
        EffectiveChild {
            name: def.name.clone(),
            defining_type: defining_type.to_string(),
            default_primary_type: def.default_primary_type.clone(),
            required_primary_types: def.required_primary_types.iter().cloned().collect(),
            multiple: def.multiple,
            mandatory: def.mandatory,
            auto_created: def.auto_created,
            protected: def.protected,
            seal: Seal::new(),
        }
    }

    /// Primary type assigned when the child is auto-created
    pub fn default_primary_type(&self) -> Option<&str> {
        self.default_primary_type.as_deref()
    }

    /// Primary types a child bound here must satisfy, ordered
    pub fn required_primary_types(&self) -> &BTreeSet<String> {
        &self.required_primary_types
    }

    /// Derived type name: the comma-joined required primary types, or the
    /// base type when the definition constrains nothing
    pub fn child_type(&self) -> String {
        if self.required_primary_types.is_empty() {
            return SYS_BASE.to_string();
        }
        self.required_primary_types
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Set the default primary type. Fails once sealed.
    pub fn set_default_primary_type(&mut self, name: Option<String>) -> Result<()> {
        self.seal.check_unsealed("EffectiveChild")?;
        self.default_primary_type = name;
        Ok(())
    }

    /// Add a required primary type. Fails once sealed.
    pub fn add_required_primary_type(&mut self, name: String) -> Result<()> {
        self.seal.check_unsealed("EffectiveChild")?;
        self.required_primary_types.insert(name);
        Ok(())
    }

    pub(crate) fn reopen(&mut self) {
        self.seal.reopen();
    }
}

impl EffectiveItem for EffectiveChild {
    fn name(&self) -> &str {
        &self.name
    }
    fn defining_type(&self) -> &str {
        &self.defining_type
    }
    fn is_residual(&self) -> bool {
        names::is_residual(&self.name)
    }
    fn is_multiple(&self) -> bool {
        self.multiple
    }
    fn is_mandatory(&self) -> bool {
        self.mandatory
    }
    fn is_auto_created(&self) -> bool {
        self.auto_created
    }
    fn is_protected(&self) -> bool {
        self.protected
    }
}

impl Sealable for EffectiveChild {
    fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }
    fn seal(&mut self) {
        self.seal.seal();
    }
}
