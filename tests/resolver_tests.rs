use audience_gate::{
    catalog::{CatalogError, CatalogSnapshot, GroupCatalog, RoleCatalog},
    models::{EntityRef, Group, Role, Source, User},
    resolver::{compute_effective_permissions, resolve_membership},
};
use std::collections::BTreeSet;

// --- Fixtures ---

const EDITOR_ID: &str = "0b7c5b1e-6f5e-4a43-9c1a-2f0d8b1e0001";
const VIEWER_ID: &str = "0b7c5b1e-6f5e-4a43-9c1a-2f0d8b1e0002";
const ADMIN_ID: &str = "0b7c5b1e-6f5e-4a43-9c1a-2f0d8b1e0003";
const WRITERS_ID: &str = "7d3f4c2a-1b2c-4d5e-8f90-a1b2c3d40001";
const OPS_ID: &str = "7d3f4c2a-1b2c-4d5e-8f90-a1b2c3d40002";

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn role(id: &str, slug: &str, permissions: &[&str]) -> Role {
    Role {
        id: id.to_string(),
        slug: slug.to_string(),
        display_name: slug.to_uppercase(),
        permissions: set(permissions),
        is_system: false,
    }
}

fn catalog() -> CatalogSnapshot {
    let roles = vec![
        role(EDITOR_ID, "editor", &["nav:read", "nav:update"]),
        role(VIEWER_ID, "viewer", &["nav:read"]),
        role(ADMIN_ID, "admin", &["*"]),
    ];
    let groups = vec![
        Group {
            id: WRITERS_ID.to_string(),
            slug: "writers".to_string(),
            display_name: "Writers".to_string(),
            roles: [EntityRef::id(EDITOR_ID)].into_iter().collect(),
        },
        Group {
            id: OPS_ID.to_string(),
            slug: "ops".to_string(),
            display_name: "Operations".to_string(),
            roles: [EntityRef::slug("admin"), EntityRef::slug("ghost")]
                .into_iter()
                .collect(),
        },
    ];
    CatalogSnapshot::new(roles, groups).expect("fixture catalog is valid")
}

// --- Catalog ---

#[test]
fn test_catalog_lookup_by_id_and_slug() {
    let catalog = catalog();

    assert_eq!(catalog.role_by_id(EDITOR_ID).unwrap().slug, "editor");
    assert_eq!(catalog.role_by_slug("viewer").unwrap().id, VIEWER_ID);
    assert_eq!(
        catalog.resolve_group(&EntityRef::slug("ops")).unwrap().id,
        OPS_ID
    );
    assert!(catalog.resolve_role(&EntityRef::id("editor")).is_none());
    assert!(catalog.resolve_role(&EntityRef::slug(EDITOR_ID)).is_none());
}

#[test]
fn test_catalog_rejects_duplicate_slugs() {
    let roles = vec![
        role(EDITOR_ID, "editor", &[]),
        role(VIEWER_ID, "editor", &[]),
    ];
    let result = CatalogSnapshot::new(roles, vec![]);
    assert!(matches!(result, Err(CatalogError::DuplicateRole(slug)) if slug == "editor"));
}

#[test]
fn test_catalog_from_json() {
    let json = format!(
        r#"{{
            "roles": [{{"id": "{EDITOR_ID}", "slug": "editor", "displayName": "Editor", "permissions": ["nav:update"]}}],
            "groups": [{{"id": "{WRITERS_ID}", "slug": "writers", "displayName": "Writers", "roles": [{{"by_slug": "editor"}}]}}]
        }}"#
    );

    let catalog = CatalogSnapshot::from_json_str(&json).expect("valid catalog json");

    assert_eq!(catalog.roles().len(), 1);
    assert!(!catalog.roles()[0].is_system);
    let writers = catalog.group_by_slug("writers").unwrap();
    assert!(writers.roles.contains(&EntityRef::slug("editor")));
}

#[test]
fn test_catalog_from_json_rejects_malformed_document() {
    let result = CatalogSnapshot::from_json_str(r#"{"roles": 42}"#);
    assert!(matches!(result, Err(CatalogError::Parse(_))));
}

// --- Effective Permissions ---

#[test]
fn test_direct_roles_and_extra_permissions_are_unioned() {
    let user = User {
        direct_roles: [EntityRef::slug("viewer")].into_iter().collect(),
        extra_permissions: set(&["reports:export"]),
        ..Default::default()
    };

    let permissions = compute_effective_permissions(&user, &catalog(), &catalog());

    assert_eq!(permissions, set(&["nav:read", "reports:export"]));
}

#[test]
fn test_group_roles_are_inherited_one_hop() {
    let catalog = catalog();
    let user = User {
        direct_groups: [EntityRef::id(WRITERS_ID)].into_iter().collect(),
        ..Default::default()
    };

    let permissions = compute_effective_permissions(&user, &catalog, &catalog);

    assert_eq!(permissions, set(&["nav:read", "nav:update"]));
}

#[test]
fn test_permissions_are_deduplicated_across_sources() {
    let catalog = catalog();
    let user = User {
        direct_roles: [EntityRef::id(VIEWER_ID), EntityRef::slug("editor")]
            .into_iter()
            .collect(),
        direct_groups: [EntityRef::slug("writers")].into_iter().collect(),
        extra_permissions: set(&["nav:read"]),
    };

    let permissions = compute_effective_permissions(&user, &catalog, &catalog);

    assert_eq!(permissions, set(&["nav:read", "nav:update"]));
}

#[test]
fn test_unknown_references_are_silently_dropped() {
    let catalog = catalog();
    let user = User {
        direct_roles: [
            EntityRef::slug("does-not-exist"),
            EntityRef::id("not-a-uuid"),
            EntityRef::slug("viewer"),
        ]
        .into_iter()
        .collect(),
        direct_groups: [EntityRef::slug("nobody")].into_iter().collect(),
        ..Default::default()
    };

    let membership = resolve_membership(&user, &catalog, &catalog);

    assert_eq!(membership.roles, set(&["viewer"]));
    assert!(membership.groups.is_empty());
    assert_eq!(membership.permissions, set(&["nav:read"]));
}

// --- Membership ---

#[test]
fn test_membership_separates_direct_and_effective_roles() {
    let catalog = catalog();
    let user = User {
        direct_roles: [EntityRef::slug("viewer")].into_iter().collect(),
        direct_groups: [EntityRef::slug("ops")].into_iter().collect(),
        ..Default::default()
    };

    let membership = resolve_membership(&user, &catalog, &catalog);

    assert_eq!(membership.roles, set(&["viewer"]));
    // "ghost" in the ops group does not resolve and is dropped.
    assert_eq!(membership.effective_roles, set(&["admin", "viewer"]));
    assert_eq!(membership.role_ids, set(&[ADMIN_ID, VIEWER_ID]));
    assert_eq!(membership.groups, set(&["ops"]));
    assert_eq!(membership.group_ids, set(&[OPS_ID]));
    assert!(membership.permissions.contains("*"));
}

#[test]
fn test_membership_into_context_keeps_invariant() {
    let catalog = catalog();
    let user = User {
        direct_roles: [EntityRef::slug("editor")].into_iter().collect(),
        direct_groups: [EntityRef::id(OPS_ID)].into_iter().collect(),
        ..Default::default()
    };

    let context = resolve_membership(&user, &catalog, &catalog).into_context(Source::Admin);

    assert_eq!(context.source, Source::Admin);
    assert!(context.effective_roles.is_superset(&context.roles));
    assert!(context.has_permission("anything:at-all"));
    assert!(!context.is_sysadmin());
}

#[test]
fn test_sample_catalog_file_resolves_groups() {
    let catalog = CatalogSnapshot::from_file("config/catalog.json").expect("sample catalog loads");
    let user = User {
        direct_groups: [EntityRef::slug("ops")].into_iter().collect(),
        ..Default::default()
    };

    let membership = resolve_membership(&user, &catalog, &catalog);

    assert_eq!(membership.effective_roles, set(&["admin"]));
    assert!(membership.permissions.contains("*"));
}
