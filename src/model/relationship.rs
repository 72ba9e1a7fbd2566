use std::fmt;
use heck::ToSnakeCase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    One,
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => f.write_str("one"),
            Cardinality::Many => f.write_str("many"),
        }
    }
}

/// Link between two entity types through a named field, stored on the source.
///
/// `from` is the source end: how many source instances share one target.
/// `to` is the target end: how many targets the field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub field: String,
    pub source: String,
    pub target: String,
    pub inverse: Option<String>,
    pub bidirectional: bool,
    pub from: Cardinality,
    pub to: Cardinality,
    /// This end holds the foreign key.
    pub owner: bool,
    /// The source names first in the canonical name.
    pub goes_first: bool,
    pub name: String,
}

impl Relationship {
    pub fn infer(
        source: &str,
        field: &str,
        target: &str,
        inverse: Option<&str>,
        from: Cardinality,
        to: Cardinality,
        declared_owner: bool,
    ) -> Self {
        let bidirectional = inverse.is_some();
        let (owner, goes_first) = ownership(bidirectional, from, to, declared_owner, source, target);
        Relationship {
            field: field.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            inverse: inverse.map(str::to_string),
            bidirectional,
            from,
            to,
            owner,
            goes_first,
            name: canonical_name(source, target, goes_first),
        }
    }

    pub fn is_many_to_many(&self) -> bool {
        self.from == Cardinality::Many && self.to == Cardinality::Many
    }
}

/// Owner and naming order, as a pure function of the link's shape.
pub fn ownership(
    bidirectional: bool,
    from: Cardinality,
    to: Cardinality,
    declared_owner: bool,
    source: &str,
    target: &str,
) -> (bool, bool) {
    use Cardinality::{Many, One};

    if !bidirectional {
        return (true, true);
    }
    match (from, to) {
        (One, One) => (declared_owner, declared_owner),
        (One, Many) => (false, true),
        (Many, One) => (true, false),
        (Many, Many) => (false, source < target),
    }
}

/// `first_second` in snake case, first being the source when it goes first.
pub fn canonical_name(source: &str, target: &str, goes_first: bool) -> String {
    let (first, second) = if goes_first { (source, target) } else { (target, source) };
    format!("{}_{}", first.to_snake_case(), second.to_snake_case())
}
