//! Collapses the accepted syntactic variants of each declaration kind into one
//! [`NormalForm`]. Errors are type-check failure reasons, not crate errors.

use chrono::{NaiveDate, NaiveTime};
use crate::rules::declaration::{RawNode, RawValue};
use crate::rules::fact::{
    CollectionKind, ComponentForm, Fact, FactKind, FieldForm, FieldShape, HostType, LabelNode, Measure,
    NormalFact, NormalForm, PropertyBag,
};

type Normalized<T> = std::result::Result<T, String>;

pub fn normalize(fact: &Fact) -> Normalized<NormalFact> {
    if fact.name.trim().is_empty() {
        return Err(format!("{} declaration has no name", fact.kind));
    }
    let props = Props(&fact.properties);

    let form = match fact.kind {
        FactKind::Decimal => {
            let precision = props.first_integer(&["precision", "digits"]).ok_or("missing precision")?;
            let scale = props.first_integer(&["scale", "fraction"]).unwrap_or(0);
            NormalForm::Decimal {
                precision: non_negative(precision, "precision")?,
                scale: non_negative(scale, "scale")?,
            }
        }
        FactKind::IntegerRange => {
            let (min, max) = props.bounds(RawValue::as_integer, |s| s.parse().ok())?;
            NormalForm::IntegerRange { min, max }
        }
        FactKind::RealRange => {
            let (min, max) = props.bounds(RawValue::as_real, |s| s.parse().ok())?;
            NormalForm::RealRange { min, max }
        }
        FactKind::StringPattern => {
            let pattern = props.first_text(&["pattern", "regex"]).ok_or("missing pattern")?;
            let max_length = match props.0.get("max_length") {
                Some(value) => {
                    let n = value.as_integer().ok_or("max_length is not an integer")?;
                    Some(non_negative(n, "max_length")? as usize)
                }
                None => None,
            };
            NormalForm::StringPattern {
                pattern: pattern.to_string(),
                max_length,
            }
        }
        FactKind::DateRange => NormalForm::DateRange {
            from: parse_date(props.first_text(&["from", "min"]).ok_or("missing from date")?)?,
            to: parse_date(props.first_text(&["to", "max"]).ok_or("missing to date")?)?,
        },
        FactKind::TimeRange => NormalForm::TimeRange {
            from: parse_time(props.first_text(&["from", "min"]).ok_or("missing from time")?)?,
            to: parse_time(props.first_text(&["to", "max"]).ok_or("missing to time")?)?,
        },
        FactKind::Enumeration => NormalForm::Enumeration {
            values: props.names("values").ok_or("values must be a list of names")?,
            finalized: props.flag("finalized"),
        },
        FactKind::Hierarchy => NormalForm::Hierarchy {
            levels: props.names("levels").ok_or("levels must be a list of names")?,
            labels: match props.0.get("labels") {
                Some(RawValue::List(items)) => items.iter().map(label_node).collect::<Normalized<_>>()?,
                Some(_) => return Err("labels must be a list".to_string()),
                None => Vec::new(),
            },
            finalized: props.flag("finalized"),
        },
        FactKind::Component | FactKind::Entity | FactKind::Dimension | FactKind::Fact | FactKind::View => {
            NormalForm::Component(component(&props)?)
        }
    };

    Ok(NormalFact {
        name: fact.name.clone(),
        kind: fact.kind,
        host_type: fact.kind.host_type(),
        form,
    })
}

fn component(props: &Props<'_>) -> Normalized<ComponentForm> {
    let fields = match props.0.get("fields") {
        Some(RawValue::List(items)) => items
            .iter()
            .map(|item| match item {
                RawValue::Node(node) => field(node),
                _ => Err("fields must be field declarations".to_string()),
            })
            .collect::<Normalized<Vec<_>>>()?,
        Some(_) => return Err("fields must be a list".to_string()),
        None => Vec::new(),
    };

    // Natural key as a component level list, or per field flags, or both.
    let mut natural_key = props.names("natural_key").unwrap_or_default();
    if let Some(RawValue::List(items)) = props.0.get("fields") {
        for node in items.iter().filter_map(|item| match item {
            RawValue::Node(node) => Some(node),
            _ => None,
        }) {
            if node.flag("natural_key") {
                if let Some(name) = node.name() {
                    if !natural_key.iter().any(|k| k == name) {
                        natural_key.push(name.to_string());
                    }
                }
            }
        }
    }

    let ancestors = props
        .names("ancestors")
        .or_else(|| props.names("view_of"))
        .unwrap_or_default();

    Ok(ComponentForm {
        fields,
        natural_key,
        ancestors,
        external_id: props.flag("external_id") || props.flag("supports_external_id"),
    })
}

fn field(node: &RawNode) -> Normalized<FieldForm> {
    let name = node.name().ok_or("field without a name")?.to_string();

    let shape = match node.text("type") {
        None => None,
        Some(type_name) => Some(match node.text("collection") {
            Some(kind_name) => {
                let kind = CollectionKind::parse(kind_name)
                    .ok_or_else(|| format!("field {}: unknown collection kind {}", name, kind_name))?;
                let key = node.text("key").map(str::to_string);
                if kind == CollectionKind::Map && key.is_none() {
                    return Err(format!("field {}: map without a key type", name));
                }
                FieldShape::Collection {
                    kind,
                    element: type_name.to_string(),
                    key,
                }
            }
            None => match HostType::from_name(type_name) {
                Some(host) => FieldShape::Simple(host),
                None => FieldShape::Reference(type_name.to_string()),
            },
        }),
    };

    let measure = match node.text("measure") {
        Some(m) => Some(Measure::parse(m).ok_or_else(|| format!("field {}: unknown measure {}", name, m))?),
        None => None,
    };

    Ok(FieldForm {
        alias: node.text("alias").map(str::to_string),
        inverse: node.text("inverse").map(str::to_string),
        owner: node.flag("owner"),
        measure,
        shape,
        name,
    })
}

fn label_node(value: &RawValue) -> Normalized<LabelNode> {
    match value {
        RawValue::Text(label) => Ok(LabelNode {
            label: label.clone(),
            children: Vec::new(),
        }),
        RawValue::Node(node) => {
            let label = node
                .text("label")
                .or_else(|| node.name())
                .ok_or("label node without a label")?;
            let children = match node.get_property("children") {
                Some(RawValue::List(items)) => items.iter().map(label_node).collect::<Normalized<_>>()?,
                Some(_) => return Err(format!("children of {} must be a list", label)),
                None => Vec::new(),
            };
            Ok(LabelNode {
                label: label.to_string(),
                children,
            })
        }
        _ => Err("labels must be names or label nodes".to_string()),
    }
}

fn non_negative(n: i64, what: &str) -> Normalized<u32> {
    u32::try_from(n).map_err(|_| format!("{} must be a non-negative integer, got {}", what, n))
}

fn parse_date(text: &str) -> Normalized<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|e| format!("bad date {}: {}", text, e))
}

fn parse_time(text: &str) -> Normalized<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|e| format!("bad time {}: {}", text, e))
}

struct Props<'a>(&'a PropertyBag);

impl Props<'_> {
    fn first_text(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|n| self.0.get(*n).and_then(RawValue::as_text))
    }

    fn first_integer(&self, names: &[&str]) -> Option<i64> {
        names.iter().find_map(|n| self.0.get(*n).and_then(RawValue::as_integer))
    }

    fn names(&self, name: &str) -> Option<Vec<String>> {
        self.0.get(name).and_then(RawValue::as_names)
    }

    fn flag(&self, name: &str) -> bool {
        self.0.get(name).and_then(RawValue::as_bool).unwrap_or(false)
    }

    /// `min`/`max`, `lower`/`upper`, or `range = "a..b"`.
    fn bounds<T>(
        &self,
        read: impl Fn(&RawValue) -> Option<T>,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Normalized<(T, T)> {
        for (lo, hi) in [("min", "max"), ("lower", "upper")] {
            if let (Some(lo), Some(hi)) = (self.0.get(lo), self.0.get(hi)) {
                return match (read(lo), read(hi)) {
                    (Some(lo), Some(hi)) => Ok((lo, hi)),
                    _ => Err("bounds are not numbers".to_string()),
                };
            }
        }
        if let Some(range) = self.first_text(&["range"]) {
            let (lo, hi) = range.split_once("..").ok_or_else(|| format!("bad range {}", range))?;
            return match (parse(lo.trim()), parse(hi.trim())) {
                (Some(lo), Some(hi)) => Ok((lo, hi)),
                _ => Err(format!("bad range {}", range)),
            };
        }
        Err("missing bounds".to_string())
    }
}
