//! Integration tests for the cache engine
//!
//! Exercises the full load pipeline over richer schemas than the unit
//! tests: inheritance chains, residual definitions, flag promotion,
//! validator carriage, and concurrent reads of a published snapshot.

use lattice_core::def::{
    ChildDefinition, FieldDeclaration, NodeTypeDefinition, PropertyDefinition, TypeDeclaration,
};
use lattice_core::{PropertyKind, Sealable};
use lattice_engine::testing::MemoryRepository;
use lattice_engine::{ContentTypeService, ContentTypesCache, EffectiveNodeTypesCache};
use std::sync::Arc;

static_assertions::assert_impl_all!(ContentTypesCache: Send, Sync);
static_assertions::assert_impl_all!(EffectiveNodeTypesCache: Send, Sync);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn fields_inherit_through_a_super_type_chain() {
    init_tracing();

    let mut basedoc_nt = NodeTypeDefinition::new("ns:basedoc", &["sys:document"]);
    basedoc_nt
        .properties
        .push(PropertyDefinition::new("intro", PropertyKind::String));
    let mut basedoc_decl = TypeDeclaration::new("ns:basedoc", &["sys:document"]);
    basedoc_decl
        .fields
        .push(FieldDeclaration::new("intro", "String"));

    let mut news_nt = NodeTypeDefinition::new("ns:news", &["ns:basedoc"]);
    news_nt
        .properties
        .push(PropertyDefinition::new("title", PropertyKind::String));
    let mut news_decl = TypeDeclaration::new("ns:news", &["ns:basedoc"]);
    news_decl
        .fields
        .push(FieldDeclaration::new("title", "String"));

    let repository = MemoryRepository::with_bootstrap()
        .with_node_type(basedoc_nt)
        .with_node_type(news_nt)
        .with_declaration(basedoc_decl)
        .with_declaration(news_decl);

    let service = ContentTypeService::new(repository);
    let types = service.content_types().unwrap();
    let news = types.get("ns:news").unwrap();

    // Own field plus the inherited one, which keeps its defining type
    assert!(news.properties().contains_key("title"));
    let intro = &news.properties()["intro"];
    assert_eq!(intro.defining_type(), "ns:basedoc");
    assert!(news.is_document_type());

    // A locally declared field overrides the inherited definition
    let basedoc = types.get("ns:basedoc").unwrap();
    assert_eq!(basedoc.properties()["intro"].defining_type(), "ns:basedoc");
}

#[test]
fn undeclared_field_resolves_against_residual_definition() {
    init_tracing();

    let mut freeform_nt = NodeTypeDefinition::new("ns:freeform", &["sys:document"]);
    freeform_nt
        .properties
        .push(PropertyDefinition::new("*", PropertyKind::String));
    let mut freeform_decl = TypeDeclaration::new("ns:freeform", &["sys:document"]);
    freeform_decl
        .fields
        .push(FieldDeclaration::new("anything", "String"));
    // A Long field has no residual of its kind and must be dropped
    freeform_decl
        .fields
        .push(FieldDeclaration::new("counter", "Long"));

    let repository = MemoryRepository::with_bootstrap()
        .with_node_type(freeform_nt)
        .with_declaration(freeform_decl);

    let service = ContentTypeService::new(repository);
    let types = service.content_types().unwrap();
    let freeform = types.get("ns:freeform").unwrap();

    let anything = &freeform.properties()["anything"];
    assert!(anything.is_resolved());
    assert!(anything.is_resolved_residual());

    assert!(!freeform.properties().contains_key("counter"));
    assert!(types.diagnostics().iter().any(|d| d.contains("counter")));
}

#[test]
fn flags_promote_upward_from_structural_definitions() {
    init_tracing();

    let mut record_nt = NodeTypeDefinition::new("ns:record", &["sys:document"]);
    record_nt.properties.push({
        let mut stamp = PropertyDefinition::new("stamp", PropertyKind::Date);
        stamp.protected = true;
        stamp.auto_created = true;
        stamp.mandatory = true;
        stamp
    });
    let mut record_decl = TypeDeclaration::new("ns:record", &["sys:document"]);
    // Declared with none of the flags the underlying definition requires
    record_decl
        .fields
        .push(FieldDeclaration::new("stamp", "Date"));

    let repository = MemoryRepository::with_bootstrap()
        .with_node_type(record_nt)
        .with_declaration(record_decl);

    let service = ContentTypeService::new(repository);
    let types = service.content_types().unwrap();
    let stamp = &types.get("ns:record").unwrap().properties()["stamp"];

    assert!(stamp.is_protected());
    assert!(stamp.is_auto_created());
    assert!(stamp.is_mandatory());
}

#[test]
fn validators_and_cascade_are_carried() {
    init_tracing();

    let mut form_nt = NodeTypeDefinition::new("ns:form", &["sys:document"]);
    form_nt
        .properties
        .push(PropertyDefinition::new("email", PropertyKind::String));
    form_nt
        .children
        .push(ChildDefinition::new("section", "sys:compound"));

    let mut form_decl = TypeDeclaration::new("ns:form", &["sys:document"]);
    form_decl.cascade_validate = true;
    form_decl.validators.push("required-fields".to_string());
    form_decl.fields.push({
        let mut email = FieldDeclaration::new("email", "String");
        email.validators.push("email".to_string());
        email.validators.push("non-empty".to_string());
        email
    });
    form_decl
        .fields
        .push(FieldDeclaration::new("section", "sys:compound"));

    let repository = MemoryRepository::with_bootstrap()
        .with_node_type(form_nt)
        .with_declaration(form_decl);

    let service = ContentTypeService::new(repository);
    let types = service.content_types().unwrap();
    let form = types.get("ns:form").unwrap();

    assert!(form.cascade_validate());
    assert_eq!(form.validators(), ["required-fields".to_string()]);
    // Field validators keep declaration order
    assert_eq!(
        form.properties()["email"].validators(),
        ["email".to_string(), "non-empty".to_string()]
    );
    assert!(form.children().contains_key("section"));
}

#[test]
fn declarations_load_from_json_fixtures() {
    init_tracing();

    let decl: TypeDeclaration = serde_json::from_str(
        r#"{
            "name": "ns:event",
            "super_types": ["sys:document"],
            "cascade_validate": true,
            "fields": [
                {"name": "starts", "field_type": "Date", "mandatory": true},
                {"name": "location", "field_type": "String"}
            ]
        }"#,
    )
    .unwrap();

    let mut event_nt = NodeTypeDefinition::new("ns:event", &["sys:document"]);
    event_nt.properties.push({
        let mut starts = PropertyDefinition::new("starts", PropertyKind::Date);
        starts.mandatory = true;
        starts
    });
    event_nt
        .properties
        .push(PropertyDefinition::new("location", PropertyKind::String));

    let repository = MemoryRepository::with_bootstrap()
        .with_node_type(event_nt)
        .with_declaration(decl);

    let service = ContentTypeService::new(repository);
    let types = service.content_types().unwrap();
    let event = types.get("ns:event").unwrap();

    assert!(event.cascade_validate());
    assert_eq!(event.properties().len(), 2);
    assert!(event.properties()["starts"].is_mandatory());
}

#[test]
fn published_snapshot_is_read_concurrently() {
    init_tracing();

    let mut seo_nt = NodeTypeDefinition::new("ns:seo", &[]);
    seo_nt.mixin = true;
    seo_nt
        .properties
        .push(PropertyDefinition::new("keywords", PropertyKind::String));
    let mut news_nt = NodeTypeDefinition::new("ns:news", &["sys:document"]);
    news_nt
        .properties
        .push(PropertyDefinition::new("title", PropertyKind::String));

    let repository = MemoryRepository::with_bootstrap()
        .with_node_type(seo_nt)
        .with_node_type(news_nt);

    let service = ContentTypeService::new(repository);
    let types = service.content_types().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let types = Arc::clone(&types);
            std::thread::spawn(move || {
                let news = types.get("ns:news").unwrap();
                assert!(news.is_sealed());
                let aggregated = types.aggregate(&["ns:news", "ns:seo"]).unwrap();
                assert!(aggregated.properties().contains_key("keywords"));
                assert!(aggregated.properties().contains_key("title"));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn effective_cache_is_shared_between_content_snapshots() {
    init_tracing();

    let repository = Arc::new(MemoryRepository::with_bootstrap());
    let service = ContentTypeService::new(Arc::clone(&repository));

    let effective = service.effective_node_types().unwrap();
    let content = service.content_types().unwrap();
    assert!(Arc::ptr_eq(&effective, content.effective_node_types()));
}
