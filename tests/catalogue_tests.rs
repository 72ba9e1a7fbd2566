use catalogix::model::relationship::Cardinality;
use catalogix::model::types::{TypeKind, TypeRef};
use catalogix::rules::declaration::{RawModel, RawNode, RawValue};
use catalogix::rules::rulebase::RuleBase;
use catalogix::{CatalogueModelFactory, Config, ErrorKind};

fn field(name: &str, ty: &str) -> RawNode {
    RawNode::new("field").with("name", name).with("type", ty)
}

fn factory() -> CatalogueModelFactory {
    CatalogueModelFactory::new(&Config::default()).unwrap()
}

#[test]
fn forward_and_circular_component_references_resolve() {
    // A is declared first and points at B; B points back at A.
    let model = RawModel::new()
        .with(RawNode::new("component").with("name", "A").with("fields", vec![field("b", "B")]))
        .with(
            RawNode::new("component")
                .with("name", "B")
                .with("fields", vec![field("a", "A"), field("siblings", "B").with("collection", "list")]),
        );
    let catalogue = factory().build(&model).unwrap();

    let a = catalogue.component("A").unwrap();
    let b = catalogue.component("B").unwrap();
    assert_eq!(catalogue.resolve(&a.fields[0].ty).unwrap().name, "B");
    assert_eq!(catalogue.resolve(&b.fields[0].ty).unwrap().name, "A");

    let siblings = catalogue.resolve(&b.fields[1].ty).unwrap();
    let TypeKind::Collection(list) = &siblings.kind else {
        panic!("siblings is not a collection");
    };
    assert_eq!(catalogue.resolve(&list.element).unwrap().name, "B");

    assert!(!catalogue.has_pending());
    assert!(catalogue.diagnostics().is_empty());
}

#[test]
fn no_placeholder_survives_normalization() {
    let model = RawModel::new()
        .with(
            RawNode::new("view")
                .with("name", "OrderSummary")
                .with("ancestors", vec!["Order"])
                .with("fields", vec![field("total", "decimal")]),
        )
        .with(
            RawNode::new("entity")
                .with("name", "Order")
                .with("fields", vec![field("total", "decimal"), field("tags", "Tag").with("collection", "set")]),
        );
    let catalogue = factory().build(&model).unwrap();

    for ty in catalogue.all_types() {
        let refs: Vec<&TypeRef> = match &ty.kind {
            TypeKind::Collection(c) => std::iter::once(&c.element).chain(c.key.as_ref()).collect(),
            kind => kind
                .component()
                .map(|c| c.fields.iter().map(|f| &f.ty).chain(c.ancestors.iter()).collect())
                .unwrap_or_default(),
        };
        assert!(refs.iter().all(|r| !r.is_pending()), "{} still has a pending reference", ty);
    }

    let view = catalogue.component("OrderSummary").unwrap();
    assert_eq!(catalogue.resolve(&view.ancestors[0]).unwrap().name, "Order");
    // Tag was never declared.
    assert_eq!(catalogue.diagnostics().len(), 1);
}

#[test]
fn bidirectional_many_to_one_relationship() {
    let model = RawModel::new()
        .with(
            RawNode::new("entity").with("name", "Order").with(
                "fields",
                vec![field("number", "string"), field("customer", "Customer").with("inverse", "orders")],
            ),
        )
        .with(
            RawNode::new("entity").with("name", "Customer").with(
                "fields",
                vec![
                    field("name", "string"),
                    field("orders", "Order").with("collection", "set").with("inverse", "customer"),
                ],
            ),
        );
    let catalogue = factory().build(&model).unwrap();

    let order_side = &catalogue.relationships("Order").unwrap()["customer"];
    assert!(order_side.bidirectional);
    assert!(order_side.owner);
    assert_eq!((order_side.from, order_side.to), (Cardinality::Many, Cardinality::One));
    assert_eq!(order_side.name, "customer_order");

    let customer_side = &catalogue.relationships("Customer").unwrap()["orders"];
    assert!(!customer_side.owner);
    assert_eq!((customer_side.from, customer_side.to), (Cardinality::One, Cardinality::Many));
    assert_eq!(customer_side.name, "customer_order");
}

#[test]
fn inverse_that_points_elsewhere_is_unidirectional() {
    let model = RawModel::new()
        .with(
            RawNode::new("entity")
                .with("name", "Order")
                .with("fields", vec![field("customer", "Customer").with("inverse", "invoices")]),
        )
        .with(
            RawNode::new("entity")
                .with("name", "Customer")
                .with("fields", vec![field("invoices", "Invoice").with("collection", "list")]),
        )
        .with(RawNode::new("entity").with("name", "Invoice").with("fields", vec![field("total", "decimal")]));
    let catalogue = factory().build(&model).unwrap();

    let order_side = &catalogue.relationships("Order").unwrap()["customer"];
    assert!(!order_side.bidirectional);
    assert_eq!((order_side.from, order_side.to), (Cardinality::Many, Cardinality::One));

    let messages: Vec<_> = catalogue.diagnostics().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["inverse field invoices on Customer does not point back to Order; treated as unidirectional"]
    );
}

#[test]
fn finalized_enumeration_yields_exactly_its_values() {
    let model = RawModel::new().with(
        RawNode::new("enumeration")
            .with("name", "Colour")
            .with("values", vec!["RED", "GREEN", "BLUE"])
            .with("finalized", true),
    );

    for fail_on_non_finalized in [false, true] {
        let catalogue = factory().fail_on_non_finalized(fail_on_non_finalized).build(&model).unwrap();
        assert_eq!(catalogue.enumeration_values("Colour").unwrap(), ["RED", "GREEN", "BLUE"]);
    }

    let catalogue = factory().build(&model).unwrap();
    let Some(TypeKind::Enumeration(colour)) = catalogue.get_type("Colour").map(|t| &t.kind) else {
        panic!("Colour is not an enumeration");
    };
    let mut extended = colour.clone();
    assert_eq!(extended.add_value("PURPLE").unwrap_err().kind, ErrorKind::InvalidState);
    assert_eq!(extended.values(true).unwrap().len(), 3);
}

#[test]
fn open_enumeration_fails_strict_iteration() {
    let model = RawModel::new().with(RawNode::new("enumeration").with("name", "Size").with("values", "S, M, L"));
    let lenient = factory().build(&model).unwrap();
    assert_eq!(lenient.enumeration_values("Size").unwrap().len(), 3);

    let strict = factory().fail_on_non_finalized(true).build(&model).unwrap();
    assert_eq!(strict.enumeration_values("Size").unwrap_err().kind, ErrorKind::InvalidState);
}

#[test]
fn hierarchy_labels_expand_to_leaf_paths() {
    let model = RawModel::new().with(
        RawNode::new("hierarchy")
            .with("name", "Geography")
            .with("levels", vec!["Country", "Region"])
            .with(
                "labels",
                vec![
                    RawValue::from(RawNode::new("label").with("label", "UK").with("children", vec!["North", "South"])),
                    RawValue::from(RawNode::new("label").with("label", "France")),
                ],
            )
            .with("finalized", true),
    );
    let catalogue = factory().build(&model).unwrap();

    let paths = catalogue.hierarchy_values("Geography").unwrap();
    assert_eq!(paths, [vec!["UK", "North"], vec!["UK", "South"], vec!["France"]]);
}

#[test]
fn model_and_rule_base_load_from_json_files() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules.json");
    std::fs::write(&rules, r#"{"name": "ranges", "rules": {"integer_range": ["bounds_ordered"]}}"#).unwrap();
    let model_path = dir.path().join("model.json");
    std::fs::write(
        &model_path,
        r#"{"declarations": [
            {"kind": "integer_range", "properties": {"name": "Age", "lower": 0, "upper": 150}},
            {"kind": "entity", "properties": {"name": "Person", "external_id": true, "fields": [
                {"kind": "field", "properties": {"name": "age", "type": "Age"}},
                {"kind": "field", "properties": {"name": "nickname"}}
            ]}}
        ]}"#,
    )
    .unwrap();

    let config = Config {
        rule_base: rules.to_string_lossy().into_owned(),
        ..Config::default()
    };
    let model = RawModel::from_json_file(&model_path).unwrap();
    let catalogue = CatalogueModelFactory::new(&config).unwrap().build(&model).unwrap();

    let person = catalogue.entity("Person").unwrap();
    assert!(person.supports_external_id);
    assert_eq!(catalogue.resolve(&person.component.fields[0].ty).unwrap().name, "Age");
    // This rule base does not require typed fields; the untyped one is dropped with a note.
    assert_eq!(person.component.fields.len(), 1);
    assert_eq!(catalogue.diagnostics().len(), 1);
}

#[test]
fn permissive_and_default_rule_bases_differ_on_untyped_fields() {
    let model = RawModel::new().with(
        RawNode::new("entity")
            .with("name", "Note")
            .with("fields", vec![field("body", "text"), RawNode::new("field").with("name", "loose")]),
    );

    let strict_rules = CatalogueModelFactory::with_rule_base(RuleBase::default_rules()).build(&model).unwrap();
    assert!(strict_rules.get_type("Note").is_none());

    let permissive = CatalogueModelFactory::with_rule_base(RuleBase::load("permissive").unwrap())
        .build(&model)
        .unwrap();
    assert_eq!(permissive.component("Note").unwrap().fields.len(), 1);
}

#[test]
fn unrecognised_declaration_kinds_are_ignored() {
    let model = RawModel::new()
        .with(RawNode::new("widget").with("name", "Gizmo"))
        .with(RawNode::new("entity").with("name", "Thing"));
    let catalogue = factory().build(&model).unwrap();

    assert!(catalogue.get_type("Gizmo").is_none());
    assert!(catalogue.get_entity_type("Thing").is_some());
    assert!(catalogue.diagnostics().is_empty());
}
