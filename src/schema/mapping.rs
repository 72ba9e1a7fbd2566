use std::collections::{HashMap, HashSet};
use serde::{Serialize, Deserialize};
use crate::analysis::analyzer::{Analyzer, TermSet};
use crate::core::error::{Error, Result};
use crate::core::types::Record;

/// Which fields of a record type are indexed, and which summary field carries
/// the rating used to order results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMapping {
    pub fields: Vec<String>,
    pub rating_field: Option<String>,
}

impl IndexMapping {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexMapping {
            fields: fields.into_iter().map(Into::into).collect(),
            rating_field: None,
        }
    }

    pub fn with_rating(mut self, rating_field: impl Into<String>) -> Self {
        self.rating_field = Some(rating_field.into());
        self
    }
}

/// What indexing a full record produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub terms: TermSet,
    pub rating_field: Option<String>,
}

/// Extraction mappings keyed by record type name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingRegistry {
    mappings: HashMap<String, IndexMapping>,
    parents: HashMap<String, Vec<String>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record_type: impl Into<String>, mapping: IndexMapping) {
        self.mappings.insert(record_type.into(), mapping);
    }

    /// Declare that `record_type` inherits the mappings of `supertype`, for record
    /// types that do not report their supertypes themselves.
    pub fn register_supertype(&mut self, record_type: impl Into<String>, supertype: impl Into<String>) {
        self.parents.entry(record_type.into()).or_default().push(supertype.into());
    }

    pub fn get(&self, record_type: &str) -> Option<&IndexMapping> {
        self.mappings.get(record_type)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Compose the mapping for a record: its own type first, then its supertypes
    /// nearest first. Fields are unioned, the nearest rating field wins.
    pub fn resolve(&self, record: &dyn Record) -> Result<IndexMapping> {
        let mut lineage: Vec<String> = vec![record.record_type().to_string()];
        lineage.extend(record.supertypes().into_iter().map(String::from));

        let mut seen = HashSet::new();
        let mut composed = IndexMapping::default();
        let mut found = false;
        let mut cursor = 0;

        while cursor < lineage.len() {
            let type_name = lineage[cursor].clone();
            cursor += 1;
            if !seen.insert(type_name.clone()) {
                continue;
            }
            if let Some(parents) = self.parents.get(&type_name) {
                lineage.extend(parents.iter().cloned());
            }
            let Some(mapping) = self.mappings.get(&type_name) else {
                continue;
            };

            found = true;
            for field in &mapping.fields {
                if !composed.fields.contains(field) {
                    composed.fields.push(field.clone());
                }
            }
            if composed.rating_field.is_none() {
                composed.rating_field = mapping.rating_field.clone();
            }
        }

        if !found {
            return Err(Error::index_mapping(format!(
                "No index mapping for record type '{}'",
                record.record_type()
            )));
        }
        Ok(composed)
    }

    /// Read every mapped field off the record and analyze it. Nothing is returned
    /// unless every mapped field was present.
    pub fn extract(&self, record: &dyn Record, analyzer: &Analyzer) -> Result<Extraction> {
        let mapping = self.resolve(record)?;

        let mut text = Vec::with_capacity(mapping.fields.len());
        for field in &mapping.fields {
            let value = record.field(field).ok_or_else(|| {
                Error::index_mapping(format!(
                    "Mapped field '{}' not found on record of type '{}'",
                    field,
                    record.record_type()
                ))
            })?;
            text.push(value.to_index_text());
        }

        Ok(Extraction {
            terms: analyzer.terms(&text.join(" ")),
            rating_field: mapping.rating_field,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::Document;

    fn registry() -> MappingRegistry {
        let mut registry = MappingRegistry::new();
        registry.register("Item", IndexMapping::new(["title"]).with_rating("rating"));
        registry.register("Book", IndexMapping::new(["author"]));
        registry
    }

    #[test]
    fn supertype_mappings_are_composed() {
        let book = Document::new("Book")
            .with_supertype("Item")
            .with_field("title", "Dune")
            .with_field("author", "Herbert");

        let mapping = registry().resolve(&book).unwrap();
        assert_eq!(mapping.fields, vec!["author".to_string(), "title".to_string()]);
        assert_eq!(mapping.rating_field.as_deref(), Some("rating"));
    }

    #[test]
    fn registry_declared_supertypes_count_too() {
        let mut registry = registry();
        registry.register_supertype("Film", "Item");

        let film = Document::new("Film").with_field("title", "Alien");
        let extraction = registry.extract(&film, &Analyzer::plain()).unwrap();
        assert!(extraction.terms.contains("alien"));
    }

    #[test]
    fn missing_mapping_is_a_mapping_error() {
        let err = registry().resolve(&Document::new("Song")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexMapping);
    }

    #[test]
    fn missing_field_is_a_mapping_error() {
        let book = Document::new("Book").with_supertype("Item").with_field("title", "Dune");
        let err = registry().extract(&book, &Analyzer::plain()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexMapping);
        assert!(err.context.contains("author"));
    }
}
