use crate::{
    matrix::{MatrixEntry, RoutePermissionMatrix},
    models::{AccessContext, AccessLevel, AccessRequirement, DenyReason, WILDCARD_PERMISSION},
};
use std::sync::Arc;

/// AccessDecision
///
/// Outcome of a route check. The HTTP layer maps `DenyUnauthenticated` to 401
/// and `DenyForbidden` to 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    DenyUnauthenticated,
    DenyForbidden,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            AccessDecision::Allow => None,
            AccessDecision::DenyUnauthenticated => Some(DenyReason::Unauthenticated),
            AccessDecision::DenyForbidden => Some(DenyReason::Forbidden),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AccessDecision::Allow => 200,
            AccessDecision::DenyUnauthenticated => 401,
            AccessDecision::DenyForbidden => 403,
        }
    }
}

/// has_access
///
/// Evaluates one route requirement against the caller's context.
///
/// * No requirement: any caller with a context.
/// * `public`/`optional`: everyone.
/// * No context: unauthenticated.
/// * `sysadmin`: always.
/// * `authenticated`: any context.
/// * Otherwise any of `anyRole`, `anyGroup`, `anyPermission`, `allPermissions` must hold.
pub fn has_access(
    requirement: Option<&AccessRequirement>,
    context: Option<&AccessContext>,
) -> AccessDecision {
    let Some(requirement) = requirement else {
        return match context {
            Some(_) => AccessDecision::Allow,
            None => AccessDecision::DenyUnauthenticated,
        };
    };

    if matches!(
        requirement.level,
        Some(AccessLevel::Public) | Some(AccessLevel::Optional)
    ) {
        return AccessDecision::Allow;
    }

    let Some(context) = context else {
        return AccessDecision::DenyUnauthenticated;
    };

    if context.is_sysadmin() || requirement.level == Some(AccessLevel::Authenticated) {
        return AccessDecision::Allow;
    }

    if satisfies(requirement, context) {
        AccessDecision::Allow
    } else {
        AccessDecision::DenyForbidden
    }
}

fn satisfies(requirement: &AccessRequirement, context: &AccessContext) -> bool {
    let wildcard = context.permissions.contains(WILDCARD_PERMISSION);

    let role_match = requirement
        .any_role
        .iter()
        .any(|role| context.roles.contains(role));
    let group_match = requirement
        .any_group
        .iter()
        .any(|group| context.groups.contains(group));
    let any_permission = !requirement.any_permission.is_empty()
        && (wildcard
            || requirement
                .any_permission
                .iter()
                .any(|p| context.permissions.contains(p)));
    let all_permissions = !requirement.all_permissions.is_empty()
        && requirement
            .all_permissions
            .iter()
            .all(|p| context.has_permission(p));

    role_match || group_match || any_permission || all_permissions
}

/// RouteDecision
///
/// A decision together with the matrix entry it was taken against, if any.
#[derive(Debug, Clone, Copy)]
pub struct RouteDecision<'a> {
    pub decision: AccessDecision,
    pub entry: Option<&'a MatrixEntry>,
}

/// RouteAuthorizer
///
/// Matches requests against a route matrix and evaluates the matched
/// requirement. Holds no mutable state; one instance is shared by every request.
#[derive(Debug, Clone)]
pub struct RouteAuthorizer {
    matrix: Arc<RoutePermissionMatrix>,
}

/// RouteAuthorizerState
///
/// The shared authorizer handle held in the application state.
pub type RouteAuthorizerState = Arc<RouteAuthorizer>;

impl RouteAuthorizer {
    pub fn new(matrix: RoutePermissionMatrix) -> Self {
        Self {
            matrix: Arc::new(matrix),
        }
    }

    pub fn matrix(&self) -> &RoutePermissionMatrix {
        &self.matrix
    }

    /// authorize
    ///
    /// An unmatched route, like an entry registered without a requirement,
    /// admits only callers with a context.
    pub fn authorize(
        &self,
        method: &str,
        path: &str,
        context: Option<&AccessContext>,
    ) -> RouteDecision<'_> {
        let entry = self.matrix.match_route(method, path);
        let decision = has_access(entry.and_then(|e| e.requirement.as_ref()), context);

        if !decision.is_allowed() {
            tracing::debug!(
                method,
                path,
                template = entry.map(|e| e.path_template.as_str()),
                ?decision,
                "route access denied"
            );
        }

        RouteDecision { decision, entry }
    }
}
