//! Resolved fields of a content type
//!
//! A `ContentTypeField` is the single-definition, disambiguated item a
//! content type exposes, produced either from a field declaration or
//! derived directly from an effective item. Unlike the effective maps,
//! field maps hold exactly one entry per name.

use crate::item::{EffectiveChild, EffectiveItem, EffectiveProperty};
use lattice_core::def::FieldDeclaration;
use lattice_core::{PropertyKind, Result, Seal, Sealable};

/// Whether a field is a primitive property or a child of another type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Primitive-valued property
    Property(PropertyKind),
    /// Child of another content type
    Child,
}

impl FieldKind {
    /// Whether this is a property field
    pub fn is_property(&self) -> bool {
        matches!(self, FieldKind::Property(_))
    }
}

/// One resolved field of a content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeField {
    name: String,
    defining_type: String,
    /// Declared type: a primitive alias or another type's name
    item_type: String,
    kind: FieldKind,
    multiple: bool,
    mandatory: bool,
    auto_created: bool,
    ordered: bool,
    protected: bool,
    validators: Vec<String>,
    /// Matched against an underlying structural definition
    resolved: bool,
    /// Matched against the residual (`"*"`) definition
    resolved_residual: bool,
    seal: Seal,
}

impl ContentTypeField {
    /// Build an unresolved field from a declaration on `defining_type`.
    ///
    /// The kind is decided by the caller: a declaration whose type aliases
    /// a primitive is a property, anything else a child.
    pub fn from_declaration(decl: &FieldDeclaration, defining_type: &str, kind: FieldKind) -> Self {
        ContentTypeField {
            name: decl.name.clone(),
            defining_type: defining_type.to_string(),
            item_type: decl.field_type.clone(),
            kind,
            multiple: decl.multiple,
            mandatory: decl.mandatory,
            auto_created: decl.auto_created,
            ordered: decl.ordered,
            protected: decl.protected,
            validators: decl.validators.clone(),
            resolved: false,
            resolved_residual: false,
            seal: Seal::new(),
        }
    }

    /// Derive an already-resolved property field from an effective item
    pub fn from_effective_property(item: &EffectiveProperty) -> Self {
        ContentTypeField {
            name: item.name().to_string(),
            defining_type: item.defining_type().to_string(),
            item_type: item.required_type().as_str().to_string(),
            kind: FieldKind::Property(item.required_type()),
            multiple: item.is_multiple(),
            mandatory: item.is_mandatory(),
            auto_created: item.is_auto_created(),
            ordered: false,
            protected: item.is_protected(),
            validators: Vec::new(),
            resolved: true,
            resolved_residual: false,
            seal: Seal::new(),
        }
    }

    /// Derive an already-resolved child field from an effective item
    pub fn from_effective_child(item: &EffectiveChild) -> Self {
        ContentTypeField {
            name: item.name().to_string(),
            defining_type: item.defining_type().to_string(),
            item_type: item.child_type(),
            kind: FieldKind::Child,
            multiple: item.is_multiple(),
            mandatory: item.is_mandatory(),
            auto_created: item.is_auto_created(),
            ordered: false,
            protected: item.is_protected(),
            validators: Vec::new(),
            resolved: true,
            resolved_residual: false,
            seal: Seal::new(),
        }
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the type that declared this field
    pub fn defining_type(&self) -> &str {
        &self.defining_type
    }

    /// Declared type alias or type name
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    /// Property or child
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether this is a property field
    pub fn is_property(&self) -> bool {
        self.kind.is_property()
    }

    /// Multi-valued
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Required on every document of the type
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Created automatically
    pub fn is_auto_created(&self) -> bool {
        self.auto_created
    }

    /// Values keep an explicit order
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Managed by the repository
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Validator identifiers, in declaration order
    pub fn validators(&self) -> &[String] {
        &self.validators
    }

    /// Whether the field has been matched against an underlying definition
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Whether the field resolved against the residual definition
    pub fn is_resolved_residual(&self) -> bool {
        self.resolved_residual
    }

    /// Mark resolved against a concrete property definition, promoting the
    /// flags the underlying definition requires
    pub fn resolve_against_property(&mut self, item: &EffectiveProperty) -> Result<()> {
        self.seal.check_unsealed("ContentTypeField")?;
        self.promote(item.is_auto_created(), item.is_mandatory(), item.is_protected());
        self.resolved = true;
        self.resolved_residual = item.is_residual();
        Ok(())
    }

    /// Mark resolved against a concrete child definition, promoting the
    /// flags the underlying definition requires
    pub fn resolve_against_child(&mut self, item: &EffectiveChild) -> Result<()> {
        self.seal.check_unsealed("ContentTypeField")?;
        self.promote(item.is_auto_created(), item.is_mandatory(), item.is_protected());
        self.resolved = true;
        self.resolved_residual = item.is_residual();
        Ok(())
    }

    fn promote(&mut self, auto_created: bool, mandatory: bool, protected: bool) {
        self.auto_created |= auto_created;
        self.mandatory |= mandatory;
        self.protected |= protected;
    }

    /// Append a validator identifier. Fails once sealed.
    pub fn push_validator(&mut self, validator: String) -> Result<()> {
        self.seal.check_unsealed("ContentTypeField")?;
        self.validators.push(validator);
        Ok(())
    }

    /// Clone with the seal flag reset, for copying a resolved field into a
    /// new aggregate under construction
    pub fn clone_unsealed(&self) -> Self {
        let mut copy = self.clone();
        copy.seal.reopen();
        copy
    }

    pub(crate) fn reopen(&mut self) {
        self.seal.reopen();
    }
}

impl Sealable for ContentTypeField {
    fn is_sealed(&self) -> bool {
        self.seal.is_sealed()
    }
    fn seal(&mut self) {
        self.seal.seal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::def::PropertyDefinition;

    fn title_declaration() -> FieldDeclaration {
        let mut decl = FieldDeclaration::new("title", "String");
        decl.mandatory = true;
        decl.validators.push("non-empty".to_string());
        decl
    }

    #[test]
    fn test_from_declaration_is_unresolved() {
        let field = ContentTypeField::from_declaration(
            &title_declaration(),
            "ns:news",
            FieldKind::Property(PropertyKind::String),
        );
        assert_eq!(field.name(), "title");
        assert_eq!(field.defining_type(), "ns:news");
        assert!(field.is_property());
        assert!(field.is_mandatory());
        assert!(!field.is_resolved());
        assert_eq!(field.validators(), ["non-empty".to_string()]);
    }

    #[test]
    fn test_resolve_promotes_flags_upward() {
        let mut field = ContentTypeField::from_declaration(
            &FieldDeclaration::new("stamp", "String"),
            "ns:news",
            FieldKind::Property(PropertyKind::String),
        );
        assert!(!field.is_protected());

        let mut def = PropertyDefinition::new("stamp", PropertyKind::String);
        def.protected = true;
        def.auto_created = true;
        let item = EffectiveProperty::from_definition(&def, "ns:news");

        field.resolve_against_property(&item).unwrap();
        assert!(field.is_resolved());
        assert!(!field.is_resolved_residual());
        assert!(field.is_protected());
        assert!(field.is_auto_created());
    }

    #[test]
    fn test_resolve_against_residual() {
        let mut field = ContentTypeField::from_declaration(
            &FieldDeclaration::new("anything", "String"),
            "ns:news",
            FieldKind::Property(PropertyKind::String),
        );
        let def = PropertyDefinition::new("*", PropertyKind::String);
        let item = EffectiveProperty::from_definition(&def, "sys:base");

        field.resolve_against_property(&item).unwrap();
        assert!(field.is_resolved());
        assert!(field.is_resolved_residual());
    }

    #[test]
    fn test_from_effective_property_is_resolved() {
        let def = PropertyDefinition::new("sys:id", PropertyKind::String);
        let item = EffectiveProperty::from_definition(&def, "sys:base");
        let field = ContentTypeField::from_effective_property(&item);
        assert!(field.is_resolved());
        assert_eq!(field.item_type(), "String");
        assert_eq!(field.kind(), FieldKind::Property(PropertyKind::String));
    }

    #[test]
    fn test_mutators_fail_after_seal() {
        let mut field = ContentTypeField::from_declaration(
            &title_declaration(),
            "ns:news",
            FieldKind::Property(PropertyKind::String),
        );
        field.seal();
        assert!(field.push_validator("extra".to_string()).is_err());

        let def = PropertyDefinition::new("title", PropertyKind::String);
        let item = EffectiveProperty::from_definition(&def, "ns:news");
        assert!(field.resolve_against_property(&item).is_err());
    }

    #[test]
    fn test_clone_unsealed() {
        let mut field = ContentTypeField::from_declaration(
            &title_declaration(),
            "ns:news",
            FieldKind::Property(PropertyKind::String),
        );
        field.seal();
        let mut copy = field.clone_unsealed();
        assert!(!copy.is_sealed());
        assert!(copy.push_validator("extra".to_string()).is_ok());
        assert!(field.is_sealed());
    }
}
