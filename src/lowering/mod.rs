//! Storage lowerings of the audience predicate tree.
//!
//! Both lowerings consume the same [`PredicateNode`](crate::audience::PredicateNode)
//! grammar and must agree with [`PredicateNode::matches`](crate::audience::PredicateNode::matches)
//! on every document. Id references that are not valid UUIDs are dropped; a
//! membership test left with nothing to compare lowers to "never matches".

pub mod document;
pub mod relational;

use crate::models::EntityRef;
use uuid::Uuid;

/// Splits references into valid ids and slugs, dropping malformed ids.
fn partition_refs(refs: &[EntityRef]) -> (Vec<Uuid>, Vec<String>) {
    let mut ids = Vec::new();
    let mut slugs = Vec::new();
    for r in refs {
        match r {
            EntityRef::ById(id) => match Uuid::parse_str(id) {
                Ok(uuid) => ids.push(uuid),
                Err(_) => tracing::debug!(id = %id, "dropping malformed id reference"),
            },
            EntityRef::BySlug(slug) => slugs.push(slug.clone()),
        }
    }
    (ids, slugs)
}
