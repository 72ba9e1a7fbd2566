use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Text fed to the analyzer when the field is indexed.
    pub fn to_index_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::to_index_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

/// Anything the index can extract named fields from: full records handed to
/// `add`/`update`, and the summary entries it keeps.
pub trait Record {
    /// Runtime type name used to look up the extraction mapping.
    fn record_type(&self) -> &str;

    /// Supertype names, nearest first. Their mappings are composed with the
    /// record type's own.
    fn supertypes(&self) -> Vec<&str> {
        Vec::new()
    }

    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// Map-backed record usable both as a full record and as a summary entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub record_type: String,
    pub supertypes: Vec<String>,
    pub fields: HashMap<String, FieldValue>,
}

impl Document {
    pub fn new(record_type: impl Into<String>) -> Self {
        Document {
            record_type: record_type.into(),
            supertypes: Vec::new(),
            fields: HashMap::new(),
        }
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn add_field(&mut self, name: String, value: FieldValue) {
        self.fields.insert(name, value);
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

impl Record for Document {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn supertypes(&self) -> Vec<&str> {
        self.supertypes.iter().map(String::as_str).collect()
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).cloned()
    }
}
