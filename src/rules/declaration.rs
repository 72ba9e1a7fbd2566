use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;

/// Property value on a raw declaration node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    List(Vec<RawValue>),
    Node(RawNode),
}

impl RawValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawValue::Integer(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            RawValue::Real(n) => Some(*n),
            RawValue::Integer(n) => Some(*n as f64),
            RawValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Bool(b) => Some(*b),
            RawValue::Text(s) => match s.trim() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text items of a list, or the comma separated parts of a single text value.
    pub fn as_names(&self) -> Option<Vec<String>> {
        match self {
            RawValue::List(items) => items
                .iter()
                .map(|item| item.as_text().map(str::to_string))
                .collect(),
            RawValue::Text(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Integer(n)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Real(n)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<RawNode> for RawValue {
    fn from(node: RawNode) -> Self {
        RawValue::Node(node)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(items: Vec<T>) -> Self {
        RawValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// One declaration as the model loader hands it over: a syntactic kind and
/// whatever properties were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, RawValue>,
}

impl RawNode {
    pub fn new(kind: impl Into<String>) -> Self {
        RawNode {
            kind: kind.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn get_property(&self, name: &str) -> Option<&RawValue> {
        self.properties.get(name)
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get_property(name).and_then(RawValue::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get_property(name).and_then(RawValue::as_integer)
    }

    pub fn real(&self, name: &str) -> Option<f64> {
        self.get_property(name).and_then(RawValue::as_real)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get_property(name).and_then(RawValue::as_bool).unwrap_or(false)
    }

    pub fn names(&self, name: &str) -> Option<Vec<String>> {
        self.get_property(name).and_then(RawValue::as_names)
    }

    /// Child nodes held in a list property. Non-node items are skipped.
    pub fn nodes(&self, name: &str) -> Vec<&RawNode> {
        match self.get_property(name) {
            Some(RawValue::List(items)) => items
                .iter()
                .filter_map(|item| match item {
                    RawValue::Node(node) => Some(node),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Where raw declarations come from.
pub trait DeclarationSource {
    /// Every declaration of one syntactic kind, in declaration order.
    fn declarations(&self, kind: &str) -> Vec<&RawNode>;

    /// Distinct kinds present, in first-seen order.
    fn kinds(&self) -> Vec<&str>;
}

/// In-memory declaration source, loadable from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawModel {
    pub declarations: Vec<RawNode>,
}

impl RawModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, node: RawNode) -> Self {
        self.declarations.push(node);
        self
    }

    pub fn push(&mut self, node: RawNode) {
        self.declarations.push(node);
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl DeclarationSource for RawModel {
    fn declarations(&self, kind: &str) -> Vec<&RawNode> {
        self.declarations.iter().filter(|node| node.kind == kind).collect()
    }

    fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = Vec::new();
        for node in &self.declarations {
            if !kinds.contains(&node.kind.as_str()) {
                kinds.push(&node.kind);
            }
        }
        kinds
    }
}
