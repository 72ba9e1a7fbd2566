use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use regex::Regex;
use serde::Deserialize;
use crate::core::error::{Error, Result};
use crate::rules::fact::{FactKind, LabelNode, NormalFact, NormalForm};

/// A single named type-check rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    BoundsOrdered,
    PatternCompiles,
    PrecisionCoversScale,
    LevelsPresent,
    LabelDepthWithinLevels,
    FieldNamesUnique,
    FieldsTyped,
}

impl Rule {
    pub const ALL: [Rule; 7] = [
        Rule::BoundsOrdered,
        Rule::PatternCompiles,
        Rule::PrecisionCoversScale,
        Rule::LevelsPresent,
        Rule::LabelDepthWithinLevels,
        Rule::FieldNamesUnique,
        Rule::FieldsTyped,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rule::BoundsOrdered => "bounds_ordered",
            Rule::PatternCompiles => "pattern_compiles",
            Rule::PrecisionCoversScale => "precision_covers_scale",
            Rule::LevelsPresent => "levels_present",
            Rule::LabelDepthWithinLevels => "label_depth_within_levels",
            Rule::FieldNamesUnique => "field_names_unique",
            Rule::FieldsTyped => "fields_typed",
        }
    }

    pub fn parse(name: &str) -> Option<Rule> {
        Rule::ALL.into_iter().find(|rule| rule.name() == name)
    }

    pub fn applies_to(self, kind: FactKind) -> bool {
        match self {
            Rule::BoundsOrdered => matches!(
                kind,
                FactKind::IntegerRange | FactKind::RealRange | FactKind::DateRange | FactKind::TimeRange
            ),
            Rule::PatternCompiles => kind == FactKind::StringPattern,
            Rule::PrecisionCoversScale => kind == FactKind::Decimal,
            Rule::LevelsPresent | Rule::LabelDepthWithinLevels => kind == FactKind::Hierarchy,
            Rule::FieldNamesUnique | Rule::FieldsTyped => kind.is_component_family(),
        }
    }

    /// Ok, or the reason the fact fails this rule.
    pub fn check(self, fact: &NormalFact) -> std::result::Result<(), String> {
        let ok = match (self, &fact.form) {
            (Rule::BoundsOrdered, NormalForm::IntegerRange { min, max }) => min <= max,
            (Rule::BoundsOrdered, NormalForm::RealRange { min, max }) => min <= max,
            (Rule::BoundsOrdered, NormalForm::DateRange { from, to }) => from <= to,
            (Rule::BoundsOrdered, NormalForm::TimeRange { from, to }) => from <= to,
            (Rule::PatternCompiles, NormalForm::StringPattern { pattern, .. }) => {
                return Regex::new(pattern).map(|_| ()).map_err(|e| format!("pattern does not compile: {}", e));
            }
            (Rule::PrecisionCoversScale, NormalForm::Decimal { precision, scale }) => {
                *precision > 0 && precision >= scale
            }
            (Rule::LevelsPresent, NormalForm::Hierarchy { levels, .. }) => !levels.is_empty(),
            (Rule::LabelDepthWithinLevels, NormalForm::Hierarchy { levels, labels, .. }) => {
                labels.iter().map(LabelNode::depth).max().unwrap_or(0) <= levels.len()
            }
            (Rule::FieldNamesUnique, NormalForm::Component(component)) => {
                let mut seen = HashSet::new();
                if let Some(dup) = component.fields.iter().find(|f| !seen.insert(f.name.as_str())) {
                    return Err(format!("field {} declared more than once", dup.name));
                }
                true
            }
            (Rule::FieldsTyped, NormalForm::Component(component)) => {
                if let Some(untyped) = component.fields.iter().find(|f| f.shape.is_none()) {
                    return Err(format!("field {} has no type", untyped.name));
                }
                true
            }
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("violates {}", self.name()))
        }
    }
}

/// Named set of rules per declaration kind, consulted once when facts are built.
#[derive(Debug, Clone)]
pub struct RuleBase {
    name: String,
    rules: BTreeMap<FactKind, Vec<Rule>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleBaseFile {
    name: String,
    rules: BTreeMap<String, Vec<String>>,
}

impl RuleBase {
    /// Built-in rule bases: `default` (every rule) and `permissive` (structural only).
    pub fn load(name: &str) -> Result<Self> {
        match name {
            "default" => Ok(Self::default_rules()),
            "permissive" => Ok(Self::with_rules("permissive", &[Rule::FieldNamesUnique])),
            other => Err(Error::configuration(format!("Unknown rule base: {}", other))),
        }
    }

    pub fn default_rules() -> Self {
        Self::with_rules("default", &Rule::ALL)
    }

    fn with_rules(name: &str, enabled: &[Rule]) -> Self {
        let rules = FactKind::ALL
            .into_iter()
            .map(|kind| {
                let applicable: Vec<Rule> = enabled.iter().copied().filter(|r| r.applies_to(kind)).collect();
                (kind, applicable)
            })
            .collect();
        RuleBase {
            name: name.to_string(),
            rules,
        }
    }

    /// Parse `{"name": .., "rules": {"<kind>": ["<rule>", ..]}}`. Unknown kinds,
    /// unknown rules and rules that cannot apply to their kind are fatal.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RuleBaseFile = serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("Rule base does not parse: {}", e)))?;

        let mut rules = BTreeMap::new();
        for (kind_name, rule_names) in file.rules {
            let kind = FactKind::parse(&kind_name)
                .ok_or_else(|| Error::configuration(format!("Unknown declaration kind in rule base: {}", kind_name)))?;
            let mut kind_rules = Vec::with_capacity(rule_names.len());
            for rule_name in rule_names {
                let rule = Rule::parse(&rule_name)
                    .ok_or_else(|| Error::configuration(format!("Unknown rule: {}", rule_name)))?;
                if !rule.applies_to(kind) {
                    return Err(Error::configuration(format!(
                        "Rule {} cannot apply to {} declarations",
                        rule_name, kind
                    )));
                }
                kind_rules.push(rule);
            }
            rules.insert(kind, kind_rules);
        }

        Ok(RuleBase { name: file.name, rules })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("Rule base {} cannot be read: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules_for(&self, kind: FactKind) -> &[Rule] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Run every rule for the fact's kind; the first failure wins.
    pub fn check(&self, fact: &NormalFact) -> std::result::Result<(), String> {
        self.rules_for(fact.kind).iter().try_for_each(|rule| rule.check(fact))
    }
}
