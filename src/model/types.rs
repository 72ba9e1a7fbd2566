use std::collections::BTreeMap;
use std::fmt;
use crate::model::enumeration::EnumerationType;
use crate::model::hierarchy::HierarchyType;
use crate::model::relationship::Relationship;
use crate::model::restricted::{DateRange, DecimalSpec, IntRange, RealRange, StringPattern, TimeRange};
use crate::rules::fact::{CollectionKind, HostType, Measure};

/// Handle of a type in its catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Reference from one type to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Resolved(TypeId),
    /// Named type not seen yet; never survives normalization.
    Pending(String),
    /// Named type that was never declared.
    Dangling(String),
}

impl TypeRef {
    pub fn id(&self) -> Option<TypeId> {
        match self {
            TypeRef::Resolved(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TypeRef::Pending(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Simple,
    Reference,
    Collection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub ty: TypeRef,
    pub alias: Option<String>,
}

/// Named product of fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentType {
    pub fields: Vec<Field>,
    pub natural_key: Vec<String>,
    pub ancestors: Vec<TypeRef>,
}

impl ComponentType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Persistable component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityType {
    pub component: ComponentType,
    pub supports_external_id: bool,
    pub relationships: BTreeMap<String, Relationship>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactType {
    pub entity: EntityType,
    pub measures: BTreeMap<String, Measure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionType {
    pub kind: CollectionKind,
    pub element: TypeRef,
    pub key: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Basic(HostType),
    RestrictedInt(IntRange),
    RestrictedReal(RealRange),
    RestrictedString(StringPattern),
    RestrictedDate(DateRange),
    RestrictedTime(TimeRange),
    RestrictedDecimal(DecimalSpec),
    Enumeration(EnumerationType),
    Hierarchy(HierarchyType),
    Collection(CollectionType),
    Component(ComponentType),
    Entity(EntityType),
    Dimension(EntityType),
    Fact(FactType),
    View(ComponentType),
}

impl TypeKind {
    pub fn label(&self) -> &'static str {
        match self {
            TypeKind::Basic(_) => "basic",
            TypeKind::RestrictedInt(_) => "restricted int",
            TypeKind::RestrictedReal(_) => "restricted real",
            TypeKind::RestrictedString(_) => "restricted string",
            TypeKind::RestrictedDate(_) => "restricted date",
            TypeKind::RestrictedTime(_) => "restricted time",
            TypeKind::RestrictedDecimal(_) => "restricted decimal",
            TypeKind::Enumeration(_) => "enumeration",
            TypeKind::Hierarchy(_) => "hierarchy",
            TypeKind::Collection(c) if c.kind == CollectionKind::Map => "map",
            TypeKind::Collection(_) => "collection",
            TypeKind::Component(_) => "component",
            TypeKind::Entity(_) => "entity",
            TypeKind::Dimension(_) => "dimension",
            TypeKind::Fact(_) => "fact",
            TypeKind::View(_) => "view",
        }
    }

    pub fn host_type(&self) -> Option<HostType> {
        match self {
            TypeKind::Basic(host) => Some(*host),
            TypeKind::RestrictedInt(_) => Some(HostType::Long),
            TypeKind::RestrictedReal(_) => Some(HostType::Double),
            TypeKind::RestrictedString(_) | TypeKind::Enumeration(_) | TypeKind::Hierarchy(_) => {
                Some(HostType::Text)
            }
            TypeKind::RestrictedDate(_) => Some(HostType::Date),
            TypeKind::RestrictedTime(_) => Some(HostType::Time),
            TypeKind::RestrictedDecimal(_) => Some(HostType::Decimal),
            _ => None,
        }
    }

    pub fn component(&self) -> Option<&ComponentType> {
        match self {
            TypeKind::Component(c) | TypeKind::View(c) => Some(c),
            TypeKind::Entity(e) | TypeKind::Dimension(e) => Some(&e.component),
            TypeKind::Fact(f) => Some(&f.entity.component),
            _ => None,
        }
    }

    pub fn component_mut(&mut self) -> Option<&mut ComponentType> {
        match self {
            TypeKind::Component(c) | TypeKind::View(c) => Some(c),
            TypeKind::Entity(e) | TypeKind::Dimension(e) => Some(&mut e.component),
            TypeKind::Fact(f) => Some(&mut f.entity.component),
            _ => None,
        }
    }

    pub fn entity(&self) -> Option<&EntityType> {
        match self {
            TypeKind::Entity(e) | TypeKind::Dimension(e) => Some(e),
            TypeKind::Fact(f) => Some(&f.entity),
            _ => None,
        }
    }

    pub fn entity_mut(&mut self) -> Option<&mut EntityType> {
        match self {
            TypeKind::Entity(e) | TypeKind::Dimension(e) => Some(e),
            TypeKind::Fact(f) => Some(&mut f.entity),
            _ => None,
        }
    }

    pub fn is_component_family(&self) -> bool {
        self.component().is_some()
    }

    pub fn is_entity(&self) -> bool {
        self.entity().is_some()
    }
}

/// A named, classified type.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind.label())
    }
}
