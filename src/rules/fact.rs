use std::collections::{BTreeMap, HashSet};
use std::fmt;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::rules::declaration::{DeclarationSource, RawValue};
use crate::rules::normalize;
use crate::rules::rulebase::RuleBase;

/// Syntactic kind of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Decimal,
    IntegerRange,
    RealRange,
    StringPattern,
    DateRange,
    TimeRange,
    Enumeration,
    Hierarchy,
    Component,
    Entity,
    Dimension,
    Fact,
    View,
}

impl FactKind {
    pub const ALL: [FactKind; 13] = [
        FactKind::Decimal,
        FactKind::IntegerRange,
        FactKind::RealRange,
        FactKind::StringPattern,
        FactKind::DateRange,
        FactKind::TimeRange,
        FactKind::Enumeration,
        FactKind::Hierarchy,
        FactKind::Component,
        FactKind::Entity,
        FactKind::Dimension,
        FactKind::Fact,
        FactKind::View,
    ];

    pub const RESTRICTED: [FactKind; 6] = [
        FactKind::Decimal,
        FactKind::IntegerRange,
        FactKind::RealRange,
        FactKind::StringPattern,
        FactKind::DateRange,
        FactKind::TimeRange,
    ];

    pub const COMPONENT_FAMILY: [FactKind; 5] = [
        FactKind::Component,
        FactKind::Entity,
        FactKind::Dimension,
        FactKind::Fact,
        FactKind::View,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FactKind::Decimal => "decimal",
            FactKind::IntegerRange => "integer_range",
            FactKind::RealRange => "real_range",
            FactKind::StringPattern => "string_pattern",
            FactKind::DateRange => "date_range",
            FactKind::TimeRange => "time_range",
            FactKind::Enumeration => "enumeration",
            FactKind::Hierarchy => "hierarchy",
            FactKind::Component => "component",
            FactKind::Entity => "entity",
            FactKind::Dimension => "dimension",
            FactKind::Fact => "fact",
            FactKind::View => "view",
        }
    }

    pub fn parse(name: &str) -> Option<FactKind> {
        FactKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn is_component_family(self) -> bool {
        FactKind::COMPONENT_FAMILY.contains(&self)
    }

    /// Host primitive backing values of this kind, if it has one.
    pub fn host_type(self) -> Option<HostType> {
        match self {
            FactKind::Decimal => Some(HostType::Decimal),
            FactKind::IntegerRange => Some(HostType::Long),
            FactKind::RealRange => Some(HostType::Double),
            FactKind::StringPattern | FactKind::Enumeration | FactKind::Hierarchy => Some(HostType::Text),
            FactKind::DateRange => Some(HostType::Date),
            FactKind::TimeRange => Some(HostType::Time),
            _ => None,
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive of the host platform a value maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostType {
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Text,
    Boolean,
    Date,
    Time,
    Timestamp,
    Binary,
}

impl HostType {
    pub const ALL: [HostType; 11] = [
        HostType::Int,
        HostType::Long,
        HostType::Float,
        HostType::Double,
        HostType::Decimal,
        HostType::Text,
        HostType::Boolean,
        HostType::Date,
        HostType::Time,
        HostType::Timestamp,
        HostType::Binary,
    ];

    /// Canonical basic type name.
    pub fn name(self) -> &'static str {
        match self {
            HostType::Int => "int",
            HostType::Long => "long",
            HostType::Float => "float",
            HostType::Double => "double",
            HostType::Decimal => "decimal",
            HostType::Text => "string",
            HostType::Boolean => "boolean",
            HostType::Date => "date",
            HostType::Time => "time",
            HostType::Timestamp => "timestamp",
            HostType::Binary => "binary",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            HostType::Int => &["integer"],
            HostType::Text => &["text", "str"],
            HostType::Boolean => &["bool"],
            HostType::Timestamp => &["datetime"],
            HostType::Binary => &["bytes", "blob"],
            _ => &[],
        }
    }

    /// Basic type by canonical name or alias.
    pub fn from_name(name: &str) -> Option<HostType> {
        HostType::ALL
            .into_iter()
            .find(|host| host.name() == name || host.aliases().contains(&name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Set,
    List,
    Bag,
    Map,
}

impl CollectionKind {
    pub fn parse(name: &str) -> Option<CollectionKind> {
        match name {
            "set" => Some(CollectionKind::Set),
            "list" => Some(CollectionKind::List),
            "bag" => Some(CollectionKind::Bag),
            "map" => Some(CollectionKind::Map),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Set => "set",
            CollectionKind::List => "list",
            CollectionKind::Bag => "bag",
            CollectionKind::Map => "map",
        }
    }
}

/// Aggregation a fact applies to one of its quantitative fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl Measure {
    pub fn parse(name: &str) -> Option<Measure> {
        match name {
            "sum" => Some(Measure::Sum),
            "avg" => Some(Measure::Avg),
            "min" => Some(Measure::Min),
            "max" => Some(Measure::Max),
            "count" => Some(Measure::Count),
            _ => None,
        }
    }
}

/// Raw properties of a fact, as declared.
pub type PropertyBag = BTreeMap<String, RawValue>;

/// A declaration as recorded in the fact base.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub name: String,
    pub kind: FactKind,
    pub properties: PropertyBag,
}

/// Shape of a component field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    /// Basic host type.
    Simple(HostType),
    /// Any other named type; may be declared later.
    Reference(String),
    Collection {
        kind: CollectionKind,
        element: String,
        key: Option<String>,
    },
}

impl FieldShape {
    /// Name of the type the field points at, if it is not a basic one.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldShape::Simple(_) => None,
            FieldShape::Reference(name) => Some(name),
            FieldShape::Collection { element, .. } => Some(element),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldShape::Collection { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldForm {
    pub name: String,
    pub shape: Option<FieldShape>,      // None = declared without a type
    pub alias: Option<String>,
    pub inverse: Option<String>,
    pub owner: bool,
    pub measure: Option<Measure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentForm {
    pub fields: Vec<FieldForm>,
    pub natural_key: Vec<String>,
    pub ancestors: Vec<String>,
    pub external_id: bool,
}

/// Node of a declared hierarchy label tree.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelNode {
    pub label: String,
    pub children: Vec<LabelNode>,
}

impl LabelNode {
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(LabelNode::depth).max().unwrap_or(0)
    }
}

/// Canonical representation of a declaration, whatever syntax it used.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalForm {
    Decimal { precision: u32, scale: u32 },
    IntegerRange { min: i64, max: i64 },
    RealRange { min: f64, max: f64 },
    StringPattern { pattern: String, max_length: Option<usize> },
    DateRange { from: NaiveDate, to: NaiveDate },
    TimeRange { from: NaiveTime, to: NaiveTime },
    Enumeration { values: Vec<String>, finalized: bool },
    Hierarchy { levels: Vec<String>, labels: Vec<LabelNode>, finalized: bool },
    Component(ComponentForm),
}

/// A fact that normalized and passed every rule for its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalFact {
    pub name: String,
    pub kind: FactKind,
    pub host_type: Option<HostType>,
    pub form: NormalForm,
}

impl NormalFact {
    pub fn component(&self) -> Option<&ComponentForm> {
        match &self.form {
            NormalForm::Component(component) => Some(component),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCheckFailure {
    pub name: String,
    pub kind: FactKind,
    pub reason: String,
}

/// Facts for every recognised declaration, each evaluated once against the rule base.
#[derive(Debug)]
pub struct FactBase {
    facts: Vec<Fact>,
    outcomes: Vec<std::result::Result<NormalFact, String>>,
}

impl FactBase {
    pub fn build(source: &dyn DeclarationSource, rules: &RuleBase) -> Self {
        let facts = convert_declarations_to_facts(source);
        let mut seen = HashSet::new();
        let outcomes = facts
            .iter()
            .map(|fact| {
                let outcome = normalize::normalize(fact).and_then(|normal| {
                    rules.check(&normal)?;
                    Ok(normal)
                });
                // Type names are unique across the catalogue whatever the rule set.
                match outcome {
                    Ok(normal) if !seen.insert(normal.name.clone()) => {
                        Err(format!("type name {} is declared more than once", normal.name))
                    }
                    other => other,
                }
            })
            .collect::<Vec<_>>();

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        debug!(facts = facts.len(), failed, rule_base = rules.name(), "fact base built");

        FactBase { facts, outcomes }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Every fact of a kind that the rules were run against.
    pub fn query_checked(&self, kind: FactKind) -> Vec<&Fact> {
        self.facts.iter().filter(|fact| fact.kind == kind).collect()
    }

    /// Facts of a kind in normal form. Facts failing a type check are absent.
    pub fn query_normal_form(&self, kind: FactKind) -> Vec<&NormalFact> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().ok())
            .filter(|normal| normal.kind == kind)
            .collect()
    }

    /// Checked facts missing from the normal-form query, with the first reason found.
    pub fn type_check_failures(&self) -> Vec<TypeCheckFailure> {
        self.facts
            .iter()
            .zip(&self.outcomes)
            .filter_map(|(fact, outcome)| {
                outcome.as_ref().err().map(|reason| TypeCheckFailure {
                    name: fact.name.clone(),
                    kind: fact.kind,
                    reason: reason.clone(),
                })
            })
            .collect()
    }

    pub(crate) fn normal_facts(&self) -> impl Iterator<Item = &NormalFact> {
        self.outcomes.iter().filter_map(|outcome| outcome.as_ref().ok())
    }
}

/// One fact per declaration of a recognised kind. Unknown kinds are skipped.
pub fn convert_declarations_to_facts(source: &dyn DeclarationSource) -> Vec<Fact> {
    let mut facts = Vec::new();
    for kind_name in source.kinds() {
        let Some(kind) = FactKind::parse(kind_name) else {
            debug!(kind = kind_name, "skipping unrecognised declaration kind");
            continue;
        };
        for node in source.declarations(kind_name) {
            facts.push(Fact {
                name: node.name().unwrap_or_default().to_string(),
                kind,
                properties: node.properties.clone(),
            });
        }
    }
    facts
}

pub(crate) fn log_failures(failures: &[TypeCheckFailure]) {
    for failure in failures {
        warn!(name = %failure.name, kind = %failure.kind, reason = %failure.reason, "type check failed");
    }
}
