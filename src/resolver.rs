use crate::{
    catalog::{GroupCatalog, RoleCatalog},
    models::{AccessContext, Role, RoleRef, Source, User},
};
use std::collections::BTreeSet;

/// Membership
///
/// Everything a credential issuer needs to embed for one user: role and group
/// slugs and ids, and the flattened permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Slugs of the directly assigned roles.
    pub roles: BTreeSet<String>,
    /// Slugs of direct and group-inherited roles.
    pub effective_roles: BTreeSet<String>,
    pub role_ids: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    pub group_ids: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Membership {
    /// into_context
    ///
    /// Builds the per-request snapshot for the given front-end.
    pub fn into_context(self, source: Source) -> AccessContext {
        AccessContext {
            roles: self.roles,
            effective_roles: self.effective_roles,
            groups: self.groups,
            permissions: self.permissions,
            source,
            role_ids: self.role_ids,
            group_ids: self.group_ids,
        }
    }
}

/// resolve_membership
///
/// Aggregates the user's direct roles and the roles of every direct group
/// (one hop, no nesting), unions their permissions and the user's extra
/// grants. References that resolve to nothing are dropped.
pub fn resolve_membership(
    user: &User,
    roles: &dyn RoleCatalog,
    groups: &dyn GroupCatalog,
) -> Membership {
    let mut membership = Membership {
        permissions: user.extra_permissions.clone(),
        ..Default::default()
    };

    for role_ref in &user.direct_roles {
        if let Some(role) = lookup_role(roles, role_ref) {
            membership.roles.insert(role.slug.clone());
            absorb_role(&mut membership, role);
        }
    }

    for group_ref in &user.direct_groups {
        let Some(group) = groups.resolve_group(group_ref) else {
            tracing::debug!(?group_ref, "dropping unknown group reference");
            continue;
        };
        membership.groups.insert(group.slug.clone());
        membership.group_ids.insert(group.id.clone());

        for role_ref in &group.roles {
            if let Some(role) = lookup_role(roles, role_ref) {
                absorb_role(&mut membership, role);
            }
        }
    }

    membership
}

/// compute_effective_permissions
///
/// The deduplicated permission set of a user: permissions of every direct or
/// group-inherited role plus the user's extra permissions.
pub fn compute_effective_permissions(
    user: &User,
    roles: &dyn RoleCatalog,
    groups: &dyn GroupCatalog,
) -> BTreeSet<String> {
    resolve_membership(user, roles, groups).permissions
}

fn lookup_role<'a>(roles: &'a dyn RoleCatalog, role_ref: &RoleRef) -> Option<&'a Role> {
    let role = roles.resolve_role(role_ref);
    if role.is_none() {
        tracing::debug!(?role_ref, "dropping unknown role reference");
    }
    role
}

fn absorb_role(membership: &mut Membership, role: &Role) {
    membership.effective_roles.insert(role.slug.clone());
    membership.role_ids.insert(role.id.clone());
    membership
        .permissions
        .extend(role.permissions.iter().cloned());
}
