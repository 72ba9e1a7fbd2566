use crate::rules::fact::{ComponentForm, FactBase, NormalFact};

/// A field of a component-family declaration pointing at another named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFact {
    pub source: String,
    pub field: String,
    pub target: String,
    pub collection: bool,
    pub inverse: Option<String>,
    pub owner: bool,
}

/// Read-side queries the model factory asks of a built fact base.
impl FactBase {
    pub fn normal(&self, name: &str) -> Option<&NormalFact> {
        self.normal_facts().find(|fact| fact.name == name)
    }

    fn component(&self, name: &str) -> Option<&ComponentForm> {
        self.normal(name).and_then(NormalFact::component)
    }

    pub fn natural_key_of(&self, component: &str) -> &[String] {
        self.component(component).map(|c| c.natural_key.as_slice()).unwrap_or(&[])
    }

    pub fn is_natural_key(&self, component: &str, field: &str) -> bool {
        self.natural_key_of(component).iter().any(|k| k == field)
    }

    pub fn supports_external_id(&self, component: &str) -> bool {
        self.component(component).is_some_and(|c| c.external_id)
    }

    /// Every non-basic field of every component-family fact, in declaration order.
    pub fn links(&self) -> Vec<LinkFact> {
        self.normal_facts()
            .filter(|fact| fact.kind.is_component_family())
            .filter_map(|fact| fact.component().map(|c| (fact, c)))
            .flat_map(|(fact, component)| {
                component.fields.iter().filter_map(move |field| {
                    let shape = field.shape.as_ref()?;
                    Some(LinkFact {
                        source: fact.name.clone(),
                        field: field.name.clone(),
                        target: shape.target()?.to_string(),
                        collection: shape.is_collection(),
                        inverse: field.inverse.clone(),
                        owner: field.owner,
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::declaration::{RawModel, RawNode};
    use crate::rules::rulebase::RuleBase;

    fn base() -> FactBase {
        let model = RawModel::new()
            .with(
                RawNode::new("entity")
                    .with("name", "Customer")
                    .with("external_id", true)
                    .with("natural_key", vec!["email"])
                    .with(
                        "fields",
                        vec![
                            RawNode::new("field").with("name", "email").with("type", "string"),
                            RawNode::new("field")
                                .with("name", "orders")
                                .with("type", "Order")
                                .with("collection", "set")
                                .with("inverse", "customer"),
                        ],
                    ),
            )
            .with(RawNode::new("view").with("name", "CustomerCard").with("ancestors", "Customer"));
        FactBase::build(&model, &RuleBase::default_rules())
    }

    #[test]
    fn component_queries() {
        let base = base();
        assert!(base.supports_external_id("Customer"));
        assert!(!base.supports_external_id("CustomerCard"));
        assert!(base.is_natural_key("Customer", "email"));
        assert!(!base.is_natural_key("Customer", "orders"));
        assert_eq!(base.natural_key_of("Customer"), ["email".to_string()]);
        assert!(base.natural_key_of("CustomerCard").is_empty());
    }

    #[test]
    fn links_cover_references_and_collections() {
        let links = base().links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "Order");
        assert!(links[0].collection);
        assert_eq!(links[0].inverse.as_deref(), Some("customer"));
    }
}
