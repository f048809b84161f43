//! Repository-snapshot input shapes
//!
//! These are the plain data carriers the surrounding repository layer hands
//! to the engine: raw structural node-type definitions (including residual
//! `"*"` definitions) and the higher-level namespace type declarations with
//! their field lists. All of them are serde-derived so fixtures can be
//! expressed as data.

use crate::kind::PropertyKind;
use crate::names;
use serde::{Deserialize, Serialize};

/// Raw structural definition of a single property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Item name, or `"*"` for the residual definition
    pub name: String,
    /// Primitive kind of the property value
    pub required_type: PropertyKind,
    /// Multi-valued
    #[serde(default)]
    pub multiple: bool,
    /// Must be present on every node of the type
    #[serde(default)]
    pub mandatory: bool,
    /// Created automatically with the node
    #[serde(default)]
    pub auto_created: bool,
    /// Managed by the repository, not writable by applications
    #[serde(default)]
    pub protected: bool,
    /// Value constraint expressions
    #[serde(default)]
    pub value_constraints: Vec<String>,
    /// Default values applied on auto-creation
    #[serde(default)]
    pub default_values: Vec<String>,
}

impl PropertyDefinition {
    /// Shorthand for a single-valued, unconstrained property definition
    pub fn new(name: impl Into<String>, required_type: PropertyKind) -> Self {
        PropertyDefinition {
            name: name.into(),
            required_type,
            multiple: false,
            mandatory: false,
            auto_created: false,
            protected: false,
            value_constraints: Vec::new(),
            default_values: Vec::new(),
        }
    }

    /// Whether this is the residual (`"*"`) definition
    pub fn is_residual(&self) -> bool {
        names::is_residual(&self.name)
    }
}

/// Raw structural definition of a single child node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDefinition {
    /// Item name, or `"*"` for the residual definition
    pub name: String,
    /// Primary types a child bound here must satisfy
    pub required_primary_types: Vec<String>,
    /// Primary type assigned when the child is auto-created
    #[serde(default)]
    pub default_primary_type: Option<String>,
    /// Same-name siblings allowed
    #[serde(default)]
    pub multiple: bool,
    /// Must be present on every node of the type
    #[serde(default)]
    pub mandatory: bool,
    /// Created automatically with the node
    #[serde(default)]
    pub auto_created: bool,
    /// Managed by the repository, not writable by applications
    #[serde(default)]
    pub protected: bool,
}

impl ChildDefinition {
    /// Shorthand for a single, unconstrained child definition
    pub fn new(name: impl Into<String>, required_primary_type: impl Into<String>) -> Self {
        ChildDefinition {
            name: name.into(),
            required_primary_types: vec![required_primary_type.into()],
            default_primary_type: None,
            multiple: false,
            mandatory: false,
            auto_created: false,
            protected: false,
        }
    }

    /// Whether this is the residual (`"*"`) definition
    pub fn is_residual(&self) -> bool {
        names::is_residual(&self.name)
    }
}

/// Raw structural definition of one node type, as registered in the
/// repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDefinition {
    /// Type name (`prefix:local`)
    pub name: String,
    /// Declared super-type names
    #[serde(default)]
    pub super_types: Vec<String>,
    /// Mixin type (attachable to nodes of any primary type)
    #[serde(default)]
    pub mixin: bool,
    /// Abstract type (never a primary type itself)
    #[serde(default)]
    pub abstract_type: bool,
    /// Child nodes keep an explicit order
    #[serde(default)]
    pub orderable: bool,
    /// Name of the primary item, if the type designates one
    #[serde(default)]
    pub primary_item: Option<String>,
    /// Property definitions, residuals included
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    /// Child definitions, residuals included
    #[serde(default)]
    pub children: Vec<ChildDefinition>,
}

impl NodeTypeDefinition {
    /// A definition with the given name and super-types, no items
    pub fn new(name: impl Into<String>, super_types: &[&str]) -> Self {
        NodeTypeDefinition {
            name: name.into(),
            super_types: super_types.iter().map(|s| s.to_string()).collect(),
            mixin: false,
            abstract_type: false,
            orderable: false,
            primary_item: None,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Namespace prefix of this type's name
    pub fn prefix(&self) -> &str {
        names::prefix_of(&self.name)
    }
}

/// One field of a namespace type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Field name
    pub name: String,
    /// Declared type: a primitive alias (`"String"`) or another type's name
    pub field_type: String,
    /// Multi-valued
    #[serde(default)]
    pub multiple: bool,
    /// Required on every document of the type
    #[serde(default)]
    pub mandatory: bool,
    /// Created automatically
    #[serde(default)]
    pub auto_created: bool,
    /// Values keep an explicit order
    #[serde(default)]
    pub ordered: bool,
    /// Managed by the repository
    #[serde(default)]
    pub protected: bool,
    /// Validator identifiers, in declaration order
    #[serde(default)]
    pub validators: Vec<String>,
}

impl FieldDeclaration {
    /// Shorthand for a plain field declaration
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        FieldDeclaration {
            name: name.into(),
            field_type: field_type.into(),
            multiple: false,
            mandatory: false,
            auto_created: false,
            ordered: false,
            protected: false,
            validators: Vec::new(),
        }
    }
}

/// One explicit type declaration under a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    /// Declared type name (`prefix:local`)
    pub name: String,
    /// Declared super-type names
    #[serde(default)]
    pub super_types: Vec<String>,
    /// Declared as a mixin
    #[serde(default)]
    pub mixin: bool,
    /// Validation cascades into compound children
    #[serde(default)]
    pub cascade_validate: bool,
    /// When set, this declaration only re-aliases a primitive kind under a
    /// new name ("remodel" node). It declares no structural type and is
    /// skipped by discovery.
    #[serde(default)]
    pub property_alias: Option<PropertyKind>,
    /// Type-level validator identifiers, in declaration order
    #[serde(default)]
    pub validators: Vec<String>,
    /// Field declarations, in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDeclaration>,
}

impl TypeDeclaration {
    /// A declaration with the given name and super-types, no fields
    pub fn new(name: impl Into<String>, super_types: &[&str]) -> Self {
        TypeDeclaration {
            name: name.into(),
            super_types: super_types.iter().map(|s| s.to_string()).collect(),
            mixin: false,
            cascade_validate: false,
            property_alias: None,
            validators: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Namespace prefix of this declaration's name
    pub fn prefix(&self) -> &str {
        names::prefix_of(&self.name)
    }

    /// Whether this is a property-alias ("remodel") declaration
    pub fn is_property_alias(&self) -> bool {
        self.property_alias.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_definition_residual() {
        let def = PropertyDefinition::new("*", PropertyKind::String);
        assert!(def.is_residual());
        let def = PropertyDefinition::new("title", PropertyKind::String);
        assert!(!def.is_residual());
    }

    #[test]
    fn test_child_definition_shorthand() {
        let def = ChildDefinition::new("author", "ns:authorCompound");
        assert_eq!(def.required_primary_types, vec!["ns:authorCompound"]);
        assert!(!def.multiple);
        assert!(def.default_primary_type.is_none());
    }

    #[test]
    fn test_node_type_definition_prefix() {
        let def = NodeTypeDefinition::new("ns:news", &["sys:document"]);
        assert_eq!(def.prefix(), "ns");
        assert_eq!(def.super_types, vec!["sys:document"]);
    }

    #[test]
    fn test_type_declaration_alias() {
        let mut decl = TypeDeclaration::new("ns:label", &[]);
        assert!(!decl.is_property_alias());
        decl.property_alias = Some(PropertyKind::String);
        assert!(decl.is_property_alias());
    }

    #[test]
    fn test_declaration_deserializes_with_defaults() {
        // Terse fixture: omitted flags default to false / empty
        let decl: TypeDeclaration = serde_json::from_str(
            r#"{
                "name": "ns:news",
                "super_types": ["sys:document"],
                "fields": [
                    {"name": "title", "field_type": "String", "mandatory": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(decl.name, "ns:news");
        assert!(!decl.mixin);
        assert!(!decl.cascade_validate);
        assert_eq!(decl.fields.len(), 1);
        assert!(decl.fields[0].mandatory);
        assert!(!decl.fields[0].multiple);
    }

    #[test]
    fn test_property_definition_serde_round_trip() {
        let def = PropertyDefinition {
            name: "tags".to_string(),
            required_type: PropertyKind::String,
            multiple: true,
            mandatory: false,
            auto_created: false,
            protected: false,
            value_constraints: vec![".{1,64}".to_string()],
            default_values: Vec::new(),
        };
        let json = serde_json::to_string(&def).unwrap();
        let back: PropertyDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }
}
