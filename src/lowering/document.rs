use super::partition_refs;
use crate::audience::{Comparison, FieldPath, Operand, PredicateNode};
use serde_json::{Map, Value, json};

/// to_document_filter
///
/// Lowers a predicate into a MongoDB query document in Extended JSON form,
/// usable as a `find` filter or a `$match` stage. Id references become
/// `{"$uuid": ...}` values; slugs stay plain strings.
pub fn to_document_filter(node: &PredicateNode) -> Value {
    match node {
        PredicateNode::And(nodes) if nodes.is_empty() => json!({}),
        PredicateNode::And(nodes) => {
            json!({ "$and": nodes.iter().map(to_document_filter).collect::<Vec<_>>() })
        }
        PredicateNode::Or(nodes) if nodes.is_empty() => never(),
        PredicateNode::Or(nodes) => {
            json!({ "$or": nodes.iter().map(to_document_filter).collect::<Vec<_>>() })
        }
        PredicateNode::Not(node) => json!({ "$nor": [to_document_filter(node)] }),
        PredicateNode::Never => never(),
        PredicateNode::Leaf { path, op, value } => leaf(path, *op, value),
    }
}

fn never() -> Value {
    json!({ "$expr": false })
}

fn field_path(path: &FieldPath) -> String {
    if path.prefix.is_empty() {
        path.field.name().to_string()
    } else {
        format!("{}.{}", path.prefix, path.field.name())
    }
}

fn leaf(path: &FieldPath, op: Comparison, value: &Operand) -> Value {
    let operand = match value {
        Operand::Visibility(visibility) => Value::String(visibility.as_str().to_string()),
        Operand::Refs(refs) => {
            let (ids, slugs) = partition_refs(refs);
            if ids.is_empty() && slugs.is_empty() {
                return never();
            }
            Value::Array(
                ids.into_iter()
                    .map(|id| json!({ "$uuid": id.to_string() }))
                    .chain(slugs.into_iter().map(Value::String))
                    .collect(),
            )
        }
    };

    let operator = match op {
        Comparison::Eq => "$eq",
        Comparison::Ne => "$ne",
        Comparison::Overlaps => "$in",
    };

    let mut condition = Map::new();
    condition.insert(operator.to_string(), operand);
    let mut filter = Map::new();
    filter.insert(field_path(path), Value::Object(condition));
    Value::Object(filter)
}

/// merge_document_filter
///
/// ANDs a lowered audience predicate onto a business filter. An empty base
/// filter is replaced outright; `None` (sysadmin) leaves the base untouched.
pub fn merge_document_filter(base: Value, audience: Option<&PredicateNode>) -> Value {
    let Some(audience) = audience else {
        return base;
    };
    let audience = to_document_filter(audience);
    match base {
        Value::Object(ref map) if map.is_empty() => audience,
        Value::Null => audience,
        base => json!({ "$and": [base, audience] }),
    }
}
