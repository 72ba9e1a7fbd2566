use std::collections::HashMap;
use tracing::debug;
use crate::model::catalogue::TypeCatalogue;
use crate::model::types::{TypeId, TypeKind, TypeRef};

/// A reference that stayed unresolved after the pending pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingRef {
    pub owner: String,
    pub place: String,
    pub target: String,
}

enum Settled {
    Unchanged,
    Resolved,
    Dangling(String),
}

fn settle(by_name: &HashMap<String, TypeId>, r: &mut TypeRef) -> Settled {
    let TypeRef::Pending(name) = r else {
        return Settled::Unchanged;
    };
    match by_name.get(name.as_str()) {
        Some(id) => {
            *r = TypeRef::Resolved(*id);
            Settled::Resolved
        }
        None => {
            let name = std::mem::take(name);
            *r = TypeRef::Dangling(name.clone());
            Settled::Dangling(name)
        }
    }
}

/// Replace every pending placeholder by a lookup in the finished name map: field
/// types, collection element and key types, and ancestors. Names still unknown
/// become dangling and are returned.
pub fn resolve_pending(catalogue: &mut TypeCatalogue) -> Vec<DanglingRef> {
    let TypeCatalogue { types, by_name, .. } = catalogue;
    let mut dangling = Vec::new();
    let mut resolved = 0usize;

    let mut record = |owner: &str, place: String, outcome: Settled| match outcome {
        Settled::Unchanged => {}
        Settled::Resolved => resolved += 1,
        Settled::Dangling(target) => dangling.push(DanglingRef {
            owner: owner.to_string(),
            place,
            target,
        }),
    };

    for ty in types.iter_mut() {
        let owner = ty.name.as_str();
        match &mut ty.kind {
            TypeKind::Collection(collection) => {
                record(owner, "element type".to_string(), settle(by_name, &mut collection.element));
                if let Some(key) = collection.key.as_mut() {
                    record(owner, "key type".to_string(), settle(by_name, key));
                }
            }
            kind => {
                let Some(component) = kind.component_mut() else {
                    continue;
                };
                for field in component.fields.iter_mut() {
                    record(owner, format!("field {}", field.name), settle(by_name, &mut field.ty));
                }
                for ancestor in component.ancestors.iter_mut() {
                    record(owner, "ancestor".to_string(), settle(by_name, ancestor));
                }
            }
        }
    }

    debug!(resolved, dangling = dangling.len(), "pending references resolved");
    dangling
}
