use crate::models::{AccessContext, AudienceSpec, EntityRef, Source, Visibility};
use std::collections::BTreeSet;

/// Field
///
/// The logical audience fields a predicate can test. Each storage lowering
/// maps these to its own field paths or columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Visibility,
    AllowRoles,
    AllowGroups,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Visibility => "visibility",
            Field::AllowRoles => "allowRoles",
            Field::AllowGroups => "allowGroups",
        }
    }
}

/// FieldPath
///
/// A logical field under the caller-supplied prefix (the audience sub-document
/// or table alias). An empty prefix addresses top-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub prefix: String,
    pub field: Field,
}

/// Comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    /// The stored list shares at least one element with the operand.
    Overlaps,
}

/// Operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Visibility(Visibility),
    Refs(Vec<EntityRef>),
}

/// PredicateNode
///
/// A storage-agnostic boolean filter over content audience fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateNode {
    And(Vec<PredicateNode>),
    Or(Vec<PredicateNode>),
    Not(Box<PredicateNode>),
    Leaf {
        path: FieldPath,
        op: Comparison,
        value: Operand,
    },
    /// A leaf that matches no document.
    Never,
}

impl PredicateNode {
    fn leaf(prefix: &str, field: Field, op: Comparison, value: Operand) -> Self {
        PredicateNode::Leaf {
            path: FieldPath {
                prefix: prefix.to_string(),
                field,
            },
            op,
            value,
        }
    }

    fn visibility(prefix: &str, op: Comparison, visibility: Visibility) -> Self {
        Self::leaf(prefix, Field::Visibility, op, Operand::Visibility(visibility))
    }

    /// matches
    ///
    /// Evaluates the predicate against one audience in memory. This is the
    /// reference semantics both storage lowerings must reproduce.
    pub fn matches(&self, audience: &AudienceSpec) -> bool {
        match self {
            PredicateNode::And(nodes) => nodes.iter().all(|n| n.matches(audience)),
            PredicateNode::Or(nodes) => nodes.iter().any(|n| n.matches(audience)),
            PredicateNode::Not(node) => !node.matches(audience),
            PredicateNode::Never => false,
            PredicateNode::Leaf { path, op, value } => match (path.field, op, value) {
                (Field::Visibility, Comparison::Eq, Operand::Visibility(v)) => {
                    audience.visibility == *v
                }
                (Field::Visibility, Comparison::Ne, Operand::Visibility(v)) => {
                    audience.visibility != *v
                }
                (Field::AllowRoles, Comparison::Overlaps, Operand::Refs(refs)) => {
                    overlaps(&audience.allow_roles, refs)
                }
                (Field::AllowGroups, Comparison::Overlaps, Operand::Refs(refs)) => {
                    overlaps(&audience.allow_groups, refs)
                }
                _ => false,
            },
        }
    }
}

fn overlaps(stored: &BTreeSet<EntityRef>, refs: &[EntityRef]) -> bool {
    let stored: BTreeSet<EntityRef> = stored.iter().filter_map(EntityRef::canonical).collect();
    refs.iter()
        .filter_map(EntityRef::canonical)
        .any(|r| stored.contains(&r))
}

/// build_predicate
///
/// Builds the visibility filter for a caller. Returns `None` for sysadmin,
/// who is not filtered at all (hidden content included).
///
/// Anonymous callers and viewer-only callers on the main site see public
/// content only. Other callers also see `authenticated` content and
/// `restricted` content that names one of their roles or groups. Hidden
/// content is excluded for everyone.
pub fn build_predicate(prefix: &str, context: Option<&AccessContext>) -> Option<PredicateNode> {
    let public = PredicateNode::visibility(prefix, Comparison::Eq, Visibility::Public);
    let not_hidden = PredicateNode::visibility(prefix, Comparison::Ne, Visibility::Hide);

    let visible = match context {
        Some(context) if context.is_sysadmin() => return None,
        None => public,
        Some(context) if context.source == Source::Main && context.is_viewer_only() => public,
        Some(context) => PredicateNode::Or(vec![
            public,
            PredicateNode::visibility(prefix, Comparison::Eq, Visibility::Authenticated),
            PredicateNode::And(vec![
                PredicateNode::visibility(prefix, Comparison::Eq, Visibility::Restricted),
                membership(prefix, context),
            ]),
        ]),
    };

    Some(PredicateNode::And(vec![visible, not_hidden]))
}

/// The caller's roles or groups appear in the allow lists. Without any
/// role or group to compare, this is `Never` rather than an empty OR.
fn membership(prefix: &str, context: &AccessContext) -> PredicateNode {
    let roles: Vec<EntityRef> = context
        .role_ids
        .iter()
        .cloned()
        .map(EntityRef::ById)
        .chain(context.all_roles().cloned().map(EntityRef::BySlug))
        .collect();
    let groups: Vec<EntityRef> = context
        .group_ids
        .iter()
        .cloned()
        .map(EntityRef::ById)
        .chain(context.groups.iter().cloned().map(EntityRef::BySlug))
        .collect();

    let mut clauses = Vec::with_capacity(2);
    if !roles.is_empty() {
        clauses.push(PredicateNode::leaf(
            prefix,
            Field::AllowRoles,
            Comparison::Overlaps,
            Operand::Refs(roles),
        ));
    }
    if !groups.is_empty() {
        clauses.push(PredicateNode::leaf(
            prefix,
            Field::AllowGroups,
            Comparison::Overlaps,
            Operand::Refs(groups),
        ));
    }

    match clauses.len() {
        0 => PredicateNode::Never,
        1 => clauses.remove(0),
        _ => PredicateNode::Or(clauses),
    }
}

/// apply_audience
///
/// ANDs the caller's audience filter onto an existing base filter. For
/// sysadmin the base filter comes back unchanged.
pub fn apply_audience(
    base: Option<PredicateNode>,
    prefix: &str,
    context: Option<&AccessContext>,
) -> Option<PredicateNode> {
    match (base, build_predicate(prefix, context)) {
        (base, None) => base,
        (None, Some(audience)) => Some(audience),
        (Some(base), Some(audience)) => Some(PredicateNode::And(vec![base, audience])),
    }
}

/// can_view
///
/// Whether a single, already loaded item is visible to the caller.
pub fn can_view(context: Option<&AccessContext>, audience: &AudienceSpec) -> bool {
    build_predicate("", context).is_none_or(|predicate| predicate.matches(audience))
}
