use std::collections::{BTreeMap, HashMap};
use crate::core::error::{Error, ErrorKind, Result};
use crate::model::relationship::Relationship;
use crate::model::types::{CollectionType, ComponentType, EntityType, Type, TypeId, TypeKind, TypeRef};
use crate::rules::fact::{CollectionKind, HostType};

/// Something normalization noticed but did not fail on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub subject: String,
    pub message: String,
}

/// The normalized set of named types. Read-only once the factory returns it.
#[derive(Debug, Clone)]
pub struct TypeCatalogue {
    pub(crate) types: Vec<Type>,
    pub(crate) by_name: HashMap<String, TypeId>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) fail_on_non_finalized: bool,
}

impl TypeCatalogue {
    /// Empty catalogue holding the basic types and their aliases.
    pub fn new() -> Self {
        let mut catalogue = TypeCatalogue {
            types: Vec::new(),
            by_name: HashMap::new(),
            diagnostics: Vec::new(),
            fail_on_non_finalized: false,
        };
        for host in HostType::ALL {
            let id = catalogue.push(host.name().to_string(), TypeKind::Basic(host));
            for alias in host.aliases() {
                catalogue.by_name.insert(alias.to_string(), id);
            }
        }
        catalogue
    }

    fn push(&mut self, name: String, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len());
        self.by_name.insert(name.clone(), id);
        self.types.push(Type { id, name, kind });
        id
    }

    /// Add a named type. Names are unique.
    pub fn insert(&mut self, name: impl Into<String>, kind: TypeKind) -> Result<TypeId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::invalid_input(format!("Type {} is already defined", name)));
        }
        Ok(self.push(name, kind))
    }

    /// The collection type for an element (and key), created on first use.
    pub fn intern_collection(&mut self, kind: CollectionKind, element: TypeRef, key: Option<TypeRef>) -> TypeId {
        let name = match &key {
            Some(key) => format!("{}<{},{}>", kind.as_str(), self.ref_name(key), self.ref_name(&element)),
            None => format!("{}<{}>", kind.as_str(), self.ref_name(&element)),
        };
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        self.push(name, TypeKind::Collection(CollectionType { kind, element, key }))
    }

    /// Name a reference points at, resolved or not.
    pub fn ref_name<'a>(&'a self, r: &'a TypeRef) -> &'a str {
        match r {
            TypeRef::Resolved(id) => self.types.get(id.0).map(|t| t.name.as_str()).unwrap_or("?"),
            TypeRef::Pending(name) | TypeRef::Dangling(name) => name,
        }
    }

    /// Resolved reference for a name if it is known, else a pending one.
    pub fn reference(&self, name: &str) -> TypeRef {
        match self.by_name.get(name) {
            Some(id) => TypeRef::Resolved(*id),
            None => TypeRef::Pending(name.to_string()),
        }
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: TypeId) -> Option<&mut Type> {
        self.types.get_mut(id.0)
    }

    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.type_id(name).and_then(|id| self.get(id))
    }

    pub fn resolve(&self, r: &TypeRef) -> Option<&Type> {
        r.id().and_then(|id| self.get(id))
    }

    /// Component-family type by name (components, entities, dimensions, facts, views).
    pub fn get_component_type(&self, name: &str) -> Option<&Type> {
        self.get_type(name).filter(|t| t.kind.is_component_family())
    }

    pub fn get_entity_type(&self, name: &str) -> Option<&Type> {
        self.get_type(name).filter(|t| t.kind.is_entity())
    }

    pub fn component(&self, name: &str) -> Option<&ComponentType> {
        self.get_type(name).and_then(|t| t.kind.component())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityType> {
        self.get_type(name).and_then(|t| t.kind.entity())
    }

    pub fn all_types(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    pub fn all_component_types(&self) -> impl Iterator<Item = &Type> {
        self.types.iter().filter(|t| t.kind.is_component_family())
    }

    pub fn all_entity_types(&self) -> impl Iterator<Item = &Type> {
        self.types.iter().filter(|t| t.kind.is_entity())
    }

    pub fn relationships(&self, entity: &str) -> Option<&BTreeMap<String, Relationship>> {
        self.entity(entity).map(|e| &e.relationships)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn diagnose(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            subject: subject.into(),
            message: message.into(),
        });
    }

    /// Whether any reference anywhere is still a pending placeholder.
    pub fn has_pending(&self) -> bool {
        self.types.iter().any(|t| match &t.kind {
            TypeKind::Collection(c) => c.element.is_pending() || c.key.as_ref().is_some_and(TypeRef::is_pending),
            kind => kind.component().is_some_and(|c| {
                c.fields.iter().any(|f| f.ty.is_pending()) || c.ancestors.iter().any(TypeRef::is_pending)
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn enumeration_values(&self, name: &str) -> Result<&[String]> {
        match self.get_type(name).map(|t| &t.kind) {
            Some(TypeKind::Enumeration(e)) => e.values(self.fail_on_non_finalized),
            _ => Err(Error::new(ErrorKind::NotFound, format!("No enumeration named {}", name))),
        }
    }

    pub fn hierarchy_values(&self, name: &str) -> Result<&[Vec<String>]> {
        match self.get_type(name).map(|t| &t.kind) {
            Some(TypeKind::Hierarchy(h)) => h.values(self.fail_on_non_finalized),
            _ => Err(Error::new(ErrorKind::NotFound, format!("No hierarchy named {}", name))),
        }
    }
}

impl Default for TypeCatalogue {
    fn default() -> Self {
        Self::new()
    }
}
