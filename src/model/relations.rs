use tracing::{debug, warn};
use crate::model::catalogue::TypeCatalogue;
use crate::model::relationship::{Cardinality, Relationship};
use crate::model::types::{Field, FieldKind, TypeKind};
use crate::rules::query::LinkFact;

/// Turn entity-to-entity links into relationships stored on the declaring entity.
/// Links whose ends are not both entities are not relationships and are skipped.
pub fn infer_relationships(catalogue: &mut TypeCatalogue, links: &[LinkFact]) -> usize {
    let mut inferred = 0;

    for link in links {
        if catalogue.get_entity_type(&link.source).is_none() || catalogue.get_entity_type(&link.target).is_none() {
            continue;
        }

        let to = if link.collection { Cardinality::Many } else { Cardinality::One };

        // The far end's shape comes from the inverse field on the target, which
        // must point back at the source.
        let inverse_kind = link.inverse.as_deref().map(|inverse| {
            catalogue
                .component(&link.target)
                .and_then(|c| c.field(inverse))
                .map(|f| (f.kind, points_to(catalogue, f, &link.source)))
        });
        let (inverse, from) = match inverse_kind {
            Some(Some((kind, true))) => {
                let from = if kind == FieldKind::Collection { Cardinality::Many } else { Cardinality::One };
                (link.inverse.as_deref(), from)
            }
            Some(found) => {
                let inverse = link.inverse.as_deref().unwrap_or_default();
                let message = match found {
                    Some(_) => format!(
                        "inverse field {} on {} does not point back to {}; treated as unidirectional",
                        inverse, link.target, link.source
                    ),
                    None => format!("inverse field {} not found on {}; treated as unidirectional", inverse, link.target),
                };
                warn!(entity = %link.source, field = %link.field, "{}", message);
                catalogue.diagnose(format!("{}.{}", link.source, link.field), message);
                (None, unidirectional_from(link))
            }
            None => (None, unidirectional_from(link)),
        };

        let relationship = Relationship::infer(
            &link.source,
            &link.field,
            &link.target,
            inverse,
            from,
            to,
            link.owner,
        );

        let Some(entity) = catalogue
            .type_id(&link.source)
            .and_then(|id| catalogue.get_mut(id))
            .and_then(|t| t.kind.entity_mut())
        else {
            continue;
        };
        entity.relationships.insert(link.field.clone(), relationship);
        inferred += 1;
    }

    debug!(inferred, "relationships inferred");
    inferred
}

/// Whether a reference or collection field resolves to the type named `target`.
fn points_to(catalogue: &TypeCatalogue, field: &Field, target: &str) -> bool {
    let element = match field.kind {
        FieldKind::Simple => return false,
        FieldKind::Reference => &field.ty,
        FieldKind::Collection => match catalogue.resolve(&field.ty).map(|t| &t.kind) {
            Some(TypeKind::Collection(collection)) => &collection.element,
            _ => return false,
        },
    };
    catalogue.resolve(element).is_some_and(|t| t.name == target)
}

/// Without an inverse the far end is unknown: a single reference is read as
/// many-to-one, a collection as one-to-many.
fn unidirectional_from(link: &LinkFact) -> Cardinality {
    if link.collection { Cardinality::One } else { Cardinality::Many }
}
