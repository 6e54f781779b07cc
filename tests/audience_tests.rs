use audience_gate::{
    audience::{
        Comparison, Field, FieldPath, Operand, PredicateNode, apply_audience, build_predicate,
        can_view,
    },
    lowering::{
        document::{merge_document_filter, to_document_filter},
        relational::{SqlParam, to_sql_fragment},
    },
    models::{AccessContext, AudienceSpec, EntityRef, Source, Visibility},
};
use serde_json::json;

// --- Helpers ---

const EDITOR_ID: &str = "0b7c5b1e-6f5e-4a43-9c1a-2f0d8b1e0001";

fn spec(visibility: Visibility, roles: &[EntityRef], groups: &[EntityRef]) -> AudienceSpec {
    AudienceSpec {
        visibility,
        allow_roles: roles.iter().cloned().collect(),
        allow_groups: groups.iter().cloned().collect(),
    }
}

fn everything() -> Vec<AudienceSpec> {
    let editor = [EntityRef::slug("editor")];
    let viewer = [EntityRef::slug("viewer")];
    vec![
        spec(Visibility::Public, &[], &[]),
        spec(Visibility::Authenticated, &[], &[]),
        spec(Visibility::Restricted, &editor, &[]),
        spec(Visibility::Restricted, &viewer, &[]),
        spec(Visibility::Restricted, &[], &[EntityRef::slug("ops")]),
        spec(Visibility::Restricted, &[], &[]),
        spec(Visibility::Hide, &editor, &[]),
        spec(Visibility::Hide, &viewer, &[]),
    ]
}

fn business_filter() -> PredicateNode {
    PredicateNode::Leaf {
        path: FieldPath {
            prefix: String::new(),
            field: Field::Visibility,
        },
        op: Comparison::Ne,
        value: Operand::Visibility(Visibility::Authenticated),
    }
}

// --- Visibility Properties ---

#[test]
fn test_anonymous_sees_public_only() {
    for audience in everything() {
        assert_eq!(
            can_view(None, &audience),
            audience.visibility == Visibility::Public,
            "{audience:?}"
        );
    }
}

#[test]
fn test_viewer_on_main_sees_public_only() {
    let viewer = AccessContext::with_roles(["viewer"]);
    assert_eq!(viewer.source, Source::Main);

    for audience in everything() {
        assert_eq!(
            can_view(Some(&viewer), &audience),
            audience.visibility == Visibility::Public,
            "{audience:?}"
        );
    }
}

#[test]
fn test_viewer_rule_applies_to_group_inherited_viewer() {
    let inherited = AccessContext {
        roles: Default::default(),
        effective_roles: ["viewer".to_string()].into_iter().collect(),
        groups: ["readers".to_string()].into_iter().collect(),
        ..AccessContext::default()
    };
    assert_eq!(inherited.source, Source::Main);
    assert!(inherited.is_viewer_only());

    let by_group = spec(Visibility::Restricted, &[], &[EntityRef::slug("readers")]);
    for audience in everything().into_iter().chain([by_group]) {
        assert_eq!(
            can_view(Some(&inherited), &audience),
            audience.visibility == Visibility::Public,
            "{audience:?}"
        );
    }
}

#[test]
fn test_viewer_rule_only_applies_on_main() {
    let viewer = AccessContext {
        source: Source::Admin,
        ..AccessContext::with_roles(["viewer"])
    };

    let restricted = spec(Visibility::Restricted, &[EntityRef::slug("viewer")], &[]);
    assert!(can_view(Some(&viewer), &spec(Visibility::Authenticated, &[], &[])));
    assert!(can_view(Some(&viewer), &restricted));
}

#[test]
fn test_viewer_rule_lifted_by_stronger_role() {
    let mut ctx = AccessContext::with_roles(["viewer"]);
    ctx.effective_roles.insert("editor".to_string());

    let restricted = spec(Visibility::Restricted, &[EntityRef::slug("editor")], &[]);
    assert!(can_view(Some(&ctx), &restricted));
}

#[test]
fn test_hidden_never_visible_to_non_sysadmin() {
    let contexts = [
        AccessContext::with_roles(["editor"]),
        AccessContext::with_roles(["viewer"]),
        AccessContext {
            source: Source::Admin,
            ..AccessContext::with_roles(["editor", "viewer"])
        },
    ];
    for ctx in &contexts {
        for audience in everything().iter().filter(|a| a.visibility == Visibility::Hide) {
            assert!(!can_view(Some(ctx), audience), "{ctx:?} {audience:?}");
        }
    }
}

#[test]
fn test_sysadmin_sees_everything() {
    let sysadmin = AccessContext::with_roles(["sysadmin"]);
    for audience in everything() {
        assert!(can_view(Some(&sysadmin), &audience), "{audience:?}");
    }
}

#[test]
fn test_restricted_matches_by_slug_or_id() {
    let editor = AccessContext {
        role_ids: [EDITOR_ID.to_string()].into_iter().collect(),
        ..AccessContext::with_roles(["editor"])
    };

    assert!(can_view(
        Some(&editor),
        &spec(Visibility::Restricted, &[EntityRef::slug("editor")], &[])
    ));
    assert!(can_view(
        Some(&editor),
        &spec(Visibility::Restricted, &[EntityRef::id(EDITOR_ID.to_uppercase())], &[])
    ));
    assert!(!can_view(
        Some(&editor),
        &spec(Visibility::Restricted, &[EntityRef::slug(EDITOR_ID)], &[])
    ));
}

#[test]
fn test_restricted_matches_by_group() {
    let member = AccessContext {
        groups: ["ops".to_string()].into_iter().collect(),
        ..AccessContext::with_roles(["user"])
    };
    assert!(can_view(
        Some(&member),
        &spec(Visibility::Restricted, &[], &[EntityRef::slug("ops")])
    ));
}

#[test]
fn test_restricted_with_empty_allow_lists_is_sysadmin_only() {
    let empty = spec(Visibility::Restricted, &[], &[]);
    let admin = AccessContext {
        permissions: ["*".to_string()].into_iter().collect(),
        ..AccessContext::with_roles(["admin", "editor"])
    };

    assert!(!can_view(Some(&admin), &empty));
    assert!(can_view(Some(&AccessContext::with_roles(["sysadmin"])), &empty));
}

// --- Predicate Structure ---

#[test]
fn test_context_without_roles_or_groups_gets_never_leaf() {
    let predicate = build_predicate("audience", Some(&AccessContext::default())).unwrap();

    let PredicateNode::And(clauses) = &predicate else {
        panic!("expected a top-level AND, got {predicate:?}");
    };
    let PredicateNode::Or(visible) = &clauses[0] else {
        panic!("expected an OR of visibility levels");
    };
    assert_eq!(
        visible[2],
        PredicateNode::And(vec![
            PredicateNode::Leaf {
                path: FieldPath {
                    prefix: "audience".to_string(),
                    field: Field::Visibility,
                },
                op: Comparison::Eq,
                value: Operand::Visibility(Visibility::Restricted),
            },
            PredicateNode::Never,
        ])
    );
    assert!(!can_view(
        Some(&AccessContext::default()),
        &spec(Visibility::Restricted, &[], &[])
    ));
}

#[test]
fn test_sysadmin_returns_base_filter_unchanged() {
    let sysadmin = AccessContext::with_roles(["sysadmin"]);

    assert_eq!(build_predicate("audience", Some(&sysadmin)), None);
    assert_eq!(
        apply_audience(Some(business_filter()), "audience", Some(&sysadmin)),
        Some(business_filter())
    );
    assert_eq!(apply_audience(None, "audience", Some(&sysadmin)), None);
}

#[test]
fn test_apply_audience_ands_onto_base() {
    let audience = build_predicate("", None).unwrap();

    assert_eq!(
        apply_audience(Some(business_filter()), "", None),
        Some(PredicateNode::And(vec![business_filter(), audience.clone()]))
    );
    assert_eq!(apply_audience(None, "", None), Some(audience));
}

// --- Lowered Shapes ---

#[test]
fn test_anonymous_document_filter() {
    let predicate = build_predicate("audience", None).unwrap();

    assert_eq!(
        to_document_filter(&predicate),
        json!({
            "$and": [
                { "audience.visibility": { "$eq": "public" } },
                { "audience.visibility": { "$ne": "hide" } }
            ]
        })
    );
}

#[test]
fn test_document_filter_converts_ids_and_drops_malformed_ones() {
    let ctx = AccessContext {
        role_ids: [EDITOR_ID.to_string(), "not-a-uuid".to_string()]
            .into_iter()
            .collect(),
        ..AccessContext::with_roles(["editor"])
    };
    let predicate = build_predicate("", Some(&ctx)).unwrap();
    let filter = to_document_filter(&predicate);

    let roles = &filter["$and"][0]["$or"][2]["$and"][1]["allowRoles"]["$in"];
    assert_eq!(roles, &json!([{ "$uuid": EDITOR_ID }, "editor"]));
}

#[test]
fn test_document_filter_with_only_malformed_ids_never_matches() {
    let node = PredicateNode::Leaf {
        path: FieldPath {
            prefix: String::new(),
            field: Field::AllowGroups,
        },
        op: Comparison::Overlaps,
        value: Operand::Refs(vec![EntityRef::id("12345")]),
    };
    assert_eq!(to_document_filter(&node), json!({ "$expr": false }));
}

#[test]
fn test_merge_document_filter() {
    let predicate = build_predicate("audience", None).unwrap();
    let lowered = to_document_filter(&predicate);

    assert_eq!(merge_document_filter(json!({}), Some(&predicate)), lowered);
    assert_eq!(
        merge_document_filter(json!({ "kind": "article" }), Some(&predicate)),
        json!({ "$and": [{ "kind": "article" }, lowered] })
    );
    assert_eq!(
        merge_document_filter(json!({ "kind": "article" }), None),
        json!({ "kind": "article" })
    );
}

#[test]
fn test_anonymous_sql_fragment() {
    let predicate = build_predicate("c", None).unwrap();
    let (sql, params) = to_sql_fragment(&predicate).render(1);

    assert_eq!(
        sql,
        r#"("c"."visibility" IS NOT DISTINCT FROM $1 AND "c"."visibility" IS DISTINCT FROM $2)"#
    );
    assert_eq!(
        params,
        vec![
            SqlParam::Text("public".to_string()),
            SqlParam::Text("hide".to_string())
        ]
    );
}

#[test]
fn test_sql_fragment_numbers_from_offset_and_splits_ids() {
    let ctx = AccessContext {
        role_ids: [EDITOR_ID.to_string()].into_iter().collect(),
        ..AccessContext::with_roles(["editor"])
    };
    let predicate = build_predicate("", Some(&ctx)).unwrap();
    let (sql, params) = to_sql_fragment(&predicate).render(3);

    assert!(sql.contains(r#"COALESCE("allow_role_ids" && $6, FALSE)"#), "{sql}");
    assert!(sql.contains(r#"COALESCE("allow_role_slugs" && $7, FALSE)"#), "{sql}");
    assert!(!sql.contains("allow_group"), "{sql}");
    assert_eq!(params.len(), 6);
    assert_eq!(params[0], SqlParam::Text("public".to_string()));
    assert_eq!(params[5], SqlParam::Text("hide".to_string()));
}
