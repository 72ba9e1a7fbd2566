use std::collections::BTreeMap;
use tracing::{debug, warn};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::model::catalogue::TypeCatalogue;
use crate::model::enumeration::EnumerationType;
use crate::model::hierarchy::{leaf_paths, HierarchyType};
use crate::model::relations::infer_relationships;
use crate::model::resolver::resolve_pending;
use crate::model::restricted::{DateRange, DecimalSpec, IntRange, RealRange, StringPattern, TimeRange};
use crate::model::types::{ComponentType, EntityType, FactType, Field, FieldKind, TypeId, TypeKind, TypeRef};
use crate::rules::declaration::DeclarationSource;
use crate::rules::fact::{self, ComponentForm, FactBase, FactKind, FieldShape, NormalFact, NormalForm};
use crate::rules::rulebase::RuleBase;

/// Builds a [`TypeCatalogue`] from raw declarations.
///
/// One call to [`build`](Self::build) is one catalogue load. Steps run in
/// dependency order, each seeing everything the earlier ones added:
///
/// 1. restricted primitives
/// 2. enumerations
/// 3. hierarchies, with label trees expanded to leaf paths
/// 4. components, entities, dimensions, facts and views; references to names
///    not seen yet become pending placeholders
/// 5. pending placeholders resolved against the finished catalogue
/// 6. relationships inferred between entities
///
/// Problems that do not stop a load (type-check failures, dangling references,
/// views that do not conform) are logged and kept as catalogue diagnostics. With
/// `strict_references` they fail the load with a configuration error instead.
pub struct CatalogueModelFactory {
    rules: RuleBase,
    strict_references: bool,
    fail_on_non_finalized: bool,
}

impl CatalogueModelFactory {
    /// Load the configured rule base: a built-in name, or a path ending in `.json`.
    pub fn new(config: &Config) -> Result<Self> {
        let rules = if config.rule_base.ends_with(".json") {
            RuleBase::from_json_file(&config.rule_base)?
        } else {
            RuleBase::load(&config.rule_base)?
        };
        Ok(CatalogueModelFactory {
            rules,
            strict_references: config.strict_references,
            fail_on_non_finalized: config.fail_on_non_finalized,
        })
    }

    pub fn with_rule_base(rules: RuleBase) -> Self {
        CatalogueModelFactory {
            rules,
            strict_references: false,
            fail_on_non_finalized: false,
        }
    }

    pub fn strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }

    pub fn fail_on_non_finalized(mut self, fail: bool) -> Self {
        self.fail_on_non_finalized = fail;
        self
    }

    pub fn build(&self, source: &dyn DeclarationSource) -> Result<TypeCatalogue> {
        let facts = FactBase::build(source, &self.rules);
        let mut load = Load {
            catalogue: TypeCatalogue::new(),
            strict: self.strict_references,
            problems: Vec::new(),
        };
        load.catalogue.fail_on_non_finalized = self.fail_on_non_finalized;

        let failures = facts.type_check_failures();
        fact::log_failures(&failures);
        for failure in &failures {
            load.record_quietly(&failure.name, format!("{} failed type check: {}", failure.kind, failure.reason));
        }

        let restricted = load.restricted_types(&facts);
        let enumerations = load.enumerations(&facts);
        let hierarchies = load.hierarchies(&facts);
        let components = load.components(&facts);
        debug!(restricted, enumerations, hierarchies, components, "types extracted");

        for dangling in resolve_pending(&mut load.catalogue) {
            load.problem(
                &dangling.owner,
                format!("{} refers to undeclared type {}", dangling.place, dangling.target),
            );
        }
        load.check_views();
        load.check_fact_references();

        let relationships = infer_relationships(&mut load.catalogue, &facts.links());
        debug!(types = load.catalogue.len(), relationships, "catalogue built");

        load.finish()
    }
}

/// State of one catalogue load.
struct Load {
    catalogue: TypeCatalogue,
    strict: bool,
    problems: Vec<String>,
}

impl Load {
    fn problem(&mut self, subject: &str, message: String) {
        warn!(subject, "{}", message);
        self.record_quietly(subject, message);
    }

    fn record_quietly(&mut self, subject: &str, message: String) {
        self.problems.push(format!("{}: {}", subject, message));
        self.catalogue.diagnose(subject, message);
    }

    fn finish(self) -> Result<TypeCatalogue> {
        if self.strict && !self.problems.is_empty() {
            return Err(Error::configuration(format!(
                "Model has {} problem(s): {}",
                self.problems.len(),
                self.problems.join("; ")
            )));
        }
        Ok(self.catalogue)
    }

    fn add(&mut self, name: &str, kind: TypeKind) -> Option<TypeId> {
        match self.catalogue.insert(name, kind) {
            Ok(id) => Some(id),
            Err(err) => {
                self.problem(name, err.context);
                None
            }
        }
    }

    fn restricted_types(&mut self, facts: &FactBase) -> usize {
        let mut added = 0;
        for kind in FactKind::RESTRICTED {
            for fact in facts.query_normal_form(kind) {
                let restricted = match &fact.form {
                    NormalForm::Decimal { precision, scale } => TypeKind::RestrictedDecimal(DecimalSpec {
                        precision: *precision,
                        scale: *scale,
                    }),
                    NormalForm::IntegerRange { min, max } => TypeKind::RestrictedInt(IntRange { min: *min, max: *max }),
                    NormalForm::RealRange { min, max } => TypeKind::RestrictedReal(RealRange { min: *min, max: *max }),
                    NormalForm::StringPattern { pattern, max_length } => {
                        match StringPattern::new(pattern, *max_length) {
                            Ok(p) => TypeKind::RestrictedString(p),
                            Err(err) => {
                                self.problem(&fact.name, err.context);
                                continue;
                            }
                        }
                    }
                    NormalForm::DateRange { from, to } => TypeKind::RestrictedDate(DateRange { from: *from, to: *to }),
                    NormalForm::TimeRange { from, to } => TypeKind::RestrictedTime(TimeRange { from: *from, to: *to }),
                    _ => continue,
                };
                added += usize::from(self.add(&fact.name, restricted).is_some());
            }
        }
        added
    }

    fn enumerations(&mut self, facts: &FactBase) -> usize {
        let mut added = 0;
        for fact in facts.query_normal_form(FactKind::Enumeration) {
            let NormalForm::Enumeration { values, finalized } = &fact.form else {
                continue;
            };
            let mut enumeration = EnumerationType::new();
            for value in values {
                // A fresh enumeration is open; adding cannot fail.
                let _ = enumeration.add_value(value.clone());
            }
            if *finalized {
                enumeration.finalize();
            }
            added += usize::from(self.add(&fact.name, TypeKind::Enumeration(enumeration)).is_some());
        }
        added
    }

    fn hierarchies(&mut self, facts: &FactBase) -> usize {
        let mut added = 0;
        for fact in facts.query_normal_form(FactKind::Hierarchy) {
            let NormalForm::Hierarchy { levels, labels, finalized } = &fact.form else {
                continue;
            };
            let mut hierarchy = HierarchyType::new(levels.clone());
            let paths = leaf_paths(
                labels.as_slice(),
                |node| node.children.as_slice(),
                |node| node.label.as_str(),
            );
            for path in paths {
                if let Err(err) = hierarchy.add_value(path) {
                    self.problem(&fact.name, err.context);
                }
            }
            if *finalized {
                hierarchy.finalize();
            }
            added += usize::from(self.add(&fact.name, TypeKind::Hierarchy(hierarchy)).is_some());
        }
        added
    }

    fn components(&mut self, facts: &FactBase) -> usize {
        let mut added = 0;
        for kind in FactKind::COMPONENT_FAMILY {
            for fact in facts.query_normal_form(kind) {
                let Some(form) = fact.component() else {
                    continue;
                };
                let component = self.component(facts, fact, form);
                let type_kind = match kind {
                    FactKind::Entity => TypeKind::Entity(entity(component, facts, &fact.name)),
                    FactKind::Dimension => TypeKind::Dimension(entity(component, facts, &fact.name)),
                    FactKind::Fact => TypeKind::Fact(FactType {
                        entity: entity(component, facts, &fact.name),
                        measures: form
                            .fields
                            .iter()
                            .filter_map(|f| f.measure.map(|m| (f.name.clone(), m)))
                            .collect::<BTreeMap<_, _>>(),
                    }),
                    FactKind::View => TypeKind::View(component),
                    _ => TypeKind::Component(component),
                };
                added += usize::from(self.add(&fact.name, type_kind).is_some());
            }
        }
        added
    }

    fn component(&mut self, facts: &FactBase, fact: &NormalFact, form: &ComponentForm) -> ComponentType {
        let mut fields = Vec::with_capacity(form.fields.len());
        for field in &form.fields {
            let Some(shape) = &field.shape else {
                self.problem(&fact.name, format!("field {} has no type and is dropped", field.name));
                continue;
            };
            let (kind, ty) = match shape {
                FieldShape::Simple(host) => (FieldKind::Simple, self.catalogue.reference(host.name())),
                FieldShape::Reference(name) => (FieldKind::Reference, self.catalogue.reference(name)),
                FieldShape::Collection { kind, element, key } => {
                    let element = self.catalogue.reference(element);
                    let key = key.as_deref().map(|k| self.catalogue.reference(k));
                    let id = self.catalogue.intern_collection(*kind, element, key);
                    (FieldKind::Collection, TypeRef::Resolved(id))
                }
            };
            fields.push(Field {
                name: field.name.clone(),
                kind,
                ty,
                alias: field.alias.clone(),
            });
        }

        let natural_key: Vec<String> = fields
            .iter()
            .filter(|f| facts.is_natural_key(&fact.name, &f.name))
            .map(|f| f.name.clone())
            .collect();
        for key in facts.natural_key_of(&fact.name) {
            if !natural_key.contains(key) {
                self.problem(&fact.name, format!("natural key field {} is not declared", key));
            }
        }

        ComponentType {
            fields,
            natural_key,
            ancestors: form.ancestors.iter().map(|a| self.catalogue.reference(a)).collect(),
        }
    }

    /// Views may only carry fields that every component they conform to has.
    fn check_views(&mut self) {
        let mut found = Vec::new();
        for ty in self.catalogue.all_types() {
            let TypeKind::View(view) = &ty.kind else {
                continue;
            };
            for ancestor in &view.ancestors {
                let Some(target) = self.catalogue.resolve(ancestor) else {
                    continue;
                };
                let Some(fields) = target.kind.component() else {
                    found.push((ty.name.clone(), format!("ancestor {} is not a component", target.name)));
                    continue;
                };
                for name in view.field_names() {
                    if fields.field(name).is_none() {
                        found.push((
                            ty.name.clone(),
                            format!("field {} is not a field of ancestor {}", name, target.name),
                        ));
                    }
                }
            }
        }
        for (subject, message) in found {
            self.problem(&subject, message);
        }
    }

    /// Facts reference dimensions; anything else component-like is flagged.
    fn check_fact_references(&mut self) {
        let mut found = Vec::new();
        for ty in self.catalogue.all_types() {
            let TypeKind::Fact(fact) = &ty.kind else {
                continue;
            };
            for field in fact.entity.component.fields.iter().filter(|f| f.kind == FieldKind::Reference) {
                let Some(target) = self.catalogue.resolve(&field.ty) else {
                    continue;
                };
                if target.kind.is_component_family() && !matches!(target.kind, TypeKind::Dimension(_)) {
                    found.push((
                        ty.name.clone(),
                        format!("field {} references {} which is not a dimension", field.name, target),
                    ));
                }
            }
        }
        for (subject, message) in found {
            self.problem(&subject, message);
        }
    }
}

fn entity(component: ComponentType, facts: &FactBase, name: &str) -> EntityType {
    EntityType {
        component,
        supports_external_id: facts.supports_external_id(name),
        relationships: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::rules::declaration::{RawModel, RawNode};

    fn field(name: &str, ty: &str) -> RawNode {
        RawNode::new("field").with("name", name).with("type", ty)
    }

    fn factory() -> CatalogueModelFactory {
        CatalogueModelFactory::with_rule_base(RuleBase::default_rules())
    }

    #[test]
    fn restricted_types_are_checked_before_use() {
        let model = RawModel::new()
            .with(RawNode::new("integer_range").with("name", "Percent").with("range", "0..100"))
            .with(RawNode::new("real_range").with("name", "Upside").with("min", 2.0).with("max", 1.0));
        let catalogue = factory().build(&model).unwrap();

        let Some(TypeKind::RestrictedInt(range)) = catalogue.get_type("Percent").map(|t| &t.kind) else {
            panic!("Percent is not a restricted int");
        };
        assert!(range.contains(42));
        assert!(catalogue.get_type("Upside").is_none());
        assert_eq!(catalogue.diagnostics().len(), 1);
    }

    #[test]
    fn strict_mode_turns_problems_into_errors() {
        let model = RawModel::new().with(
            RawNode::new("component")
                .with("name", "Address")
                .with("fields", vec![field("country", "Country")]),
        );
        assert!(factory().build(&model).is_ok());

        let err = factory().strict_references(true).build(&model).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn dangling_references_are_kept_as_such() {
        let model = RawModel::new().with(
            RawNode::new("component")
                .with("name", "Address")
                .with("fields", vec![field("country", "Country")]),
        );
        let catalogue = factory().build(&model).unwrap();
        let address = catalogue.component("Address").unwrap();
        assert_eq!(address.fields[0].ty, TypeRef::Dangling("Country".into()));
        assert!(!catalogue.has_pending());
    }

    #[test]
    fn natural_keys_follow_field_order_and_flag_unknown_fields() {
        let model = RawModel::new().with(
            RawNode::new("entity")
                .with("name", "Account")
                .with("natural_key", vec!["number", "branch", "iban"])
                .with(
                    "fields",
                    vec![
                        field("branch", "string"),
                        field("holder", "string"),
                        field("number", "string"),
                    ],
                ),
        );
        let catalogue = factory().build(&model).unwrap();

        let account = catalogue.entity("Account").unwrap();
        assert_eq!(account.component.natural_key, ["branch", "number"]);
        let messages: Vec<_> = catalogue.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["natural key field iban is not declared"]);
    }

    #[test]
    fn view_fields_must_conform() {
        let model = RawModel::new()
            .with(
                RawNode::new("entity")
                    .with("name", "Customer")
                    .with("fields", vec![field("name", "string"), field("email", "string")]),
            )
            .with(
                RawNode::new("view")
                    .with("name", "CustomerCard")
                    .with("ancestors", vec!["Customer"])
                    .with("fields", vec![field("name", "string"), field("phone", "string")]),
            );
        let catalogue = factory().build(&model).unwrap();

        assert!(catalogue.get_component_type("CustomerCard").is_some());
        let messages: Vec<_> = catalogue.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["field phone is not a field of ancestor Customer"]);
    }

    #[test]
    fn facts_carry_measures_and_flag_non_dimension_references() {
        let model = RawModel::new()
            .with(RawNode::new("dimension").with("name", "Store").with("fields", vec![field("code", "string")]))
            .with(RawNode::new("entity").with("name", "Clerk").with("fields", vec![field("name", "string")]))
            .with(
                RawNode::new("fact").with("name", "Sale").with(
                    "fields",
                    vec![
                        field("store", "Store"),
                        field("clerk", "Clerk"),
                        field("amount", "decimal").with("measure", "sum"),
                    ],
                ),
            );
        let catalogue = factory().build(&model).unwrap();

        let Some(TypeKind::Fact(sale)) = catalogue.get_type("Sale").map(|t| &t.kind) else {
            panic!("Sale is not a fact");
        };
        assert_eq!(sale.measures.len(), 1);
        assert_eq!(catalogue.diagnostics().len(), 1);
        assert!(catalogue.diagnostics()[0].message.contains("clerk"));
    }

    #[test]
    fn rule_base_is_loaded_from_config() {
        let config = Config {
            rule_base: "nonexistent".to_string(),
            ..Config::default()
        };
        assert_eq!(CatalogueModelFactory::new(&config).err().map(|e| e.kind), Some(ErrorKind::Configuration));
        assert!(CatalogueModelFactory::new(&Config::default()).is_ok());
    }
}
