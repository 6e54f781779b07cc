use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role slug that bypasses every route check and every audience filter.
pub const SYSADMIN_ROLE: &str = "sysadmin";
/// Role slug that is restricted to public content on the main site.
pub const VIEWER_ROLE: &str = "viewer";
/// Permission value that satisfies any permission check.
pub const WILDCARD_PERMISSION: &str = "*";

// --- Catalog Entities (Owned by collaborators, read-only here) ---

/// EntityRef
///
/// A reference to a role or a group, either by catalog id or by slug.
/// References are always tagged; nothing downstream inspects a bare string
/// to guess which kind of reference it is.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EntityRef {
    ById(String),
    BySlug(String),
}

/// Reference to a role in the role catalog.
pub type RoleRef = EntityRef;
/// Reference to a group in the group catalog.
pub type GroupRef = EntityRef;

impl EntityRef {
    pub fn id(id: impl Into<String>) -> Self {
        EntityRef::ById(id.into())
    }

    pub fn slug(slug: impl Into<String>) -> Self {
        EntityRef::BySlug(slug.into())
    }

    /// canonical
    ///
    /// Normalizes an id reference to the lowercase hyphenated UUID form.
    /// Returns `None` for an id that is not a valid UUID: such a reference can
    /// never match stored content.
    pub fn canonical(&self) -> Option<EntityRef> {
        match self {
            EntityRef::ById(id) => Uuid::parse_str(id)
                .ok()
                .map(|uuid| EntityRef::ById(uuid.to_string())),
            EntityRef::BySlug(slug) => Some(EntityRef::BySlug(slug.clone())),
        }
    }
}

/// Role
///
/// A named bundle of permissions. `permissions` may contain the wildcard `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Role {
    pub id: String,
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub is_system: bool,
}

/// Group
///
/// A set of users that inherit every role listed in `roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Group {
    pub id: String,
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: BTreeSet<RoleRef>,
}

/// User
///
/// The role/group assignments of a user, as stored by the identity collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    #[serde(default)]
    pub direct_roles: BTreeSet<RoleRef>,
    #[serde(default)]
    pub direct_groups: BTreeSet<GroupRef>,
    #[serde(default)]
    pub extra_permissions: BTreeSet<String>,
}

// --- Request Identity ---

/// Source
///
/// The front-end a request originates from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Source {
    #[default]
    Main,
    Admin,
}

/// AccessContext
///
/// The immutable identity snapshot of one request, built by the credential
/// layer from an already verified token. Anonymous callers have no context at all
/// (`Option<AccessContext>` is `None`).
///
/// The snapshot reflects assignments at credential issuance; role or group
/// changes are only visible once the credential is reissued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccessContext {
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Superset of `roles`, including roles inherited through groups.
    #[serde(default)]
    pub effective_roles: BTreeSet<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub source: Source,
    /// Catalog ids of the effective roles.
    #[serde(default)]
    pub role_ids: BTreeSet<String>,
    /// Catalog ids of the groups.
    #[serde(default)]
    pub group_ids: BTreeSet<String>,
}

impl AccessContext {
    /// Shorthand for a context holding only the given role slugs.
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        Self {
            effective_roles: roles.clone(),
            roles,
            ..Default::default()
        }
    }

    pub fn is_sysadmin(&self) -> bool {
        self.roles.contains(SYSADMIN_ROLE)
    }

    /// has_permission
    ///
    /// True if the context holds `permission` or the wildcard.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(WILDCARD_PERMISSION) || self.permissions.contains(permission)
    }

    /// Every role slug attributable to the caller (`effectiveRoles ∪ roles`).
    pub fn all_roles(&self) -> impl Iterator<Item = &String> {
        self.effective_roles
            .iter()
            .chain(self.roles.iter().filter(|r| !self.effective_roles.contains(*r)))
    }

    /// is_viewer_only
    ///
    /// True when `viewer` is the only role the caller holds, directly or effectively.
    pub fn is_viewer_only(&self) -> bool {
        let mut roles = self.all_roles().peekable();
        roles.peek().is_some() && roles.all(|r| r == VIEWER_ROLE)
    }
}

// --- Route Requirements ---

/// AccessLevel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AccessLevel {
    /// Anyone, including anonymous callers.
    Public,
    /// Any caller with a context.
    Authenticated,
    /// Anyone; a context is used when present.
    Optional,
}

/// AccessRequirement
///
/// The requirement attached to one route. Without a `level`, the four
/// clauses are OR'd: holding any listed role, any listed group, any listed
/// permission, or all of `allPermissions` is sufficient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccessRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub level: Option<AccessLevel>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub any_role: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub any_group: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub any_permission: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub all_permissions: BTreeSet<String>,
}

fn collect_set<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl AccessRequirement {
    pub fn level(level: AccessLevel) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn public() -> Self {
        Self::level(AccessLevel::Public)
    }

    pub fn authenticated() -> Self {
        Self::level(AccessLevel::Authenticated)
    }

    pub fn optional() -> Self {
        Self::level(AccessLevel::Optional)
    }

    pub fn any_role<I: IntoIterator<Item = S>, S: Into<String>>(roles: I) -> Self {
        Self::default().or_any_role(roles)
    }

    pub fn any_permission<I: IntoIterator<Item = S>, S: Into<String>>(permissions: I) -> Self {
        Self::default().or_any_permission(permissions)
    }

    pub fn all_permissions<I: IntoIterator<Item = S>, S: Into<String>>(permissions: I) -> Self {
        Self {
            all_permissions: collect_set(permissions),
            ..Default::default()
        }
    }

    pub fn or_any_role<I: IntoIterator<Item = S>, S: Into<String>>(mut self, roles: I) -> Self {
        self.any_role.extend(collect_set(roles));
        self
    }

    pub fn or_any_group<I: IntoIterator<Item = S>, S: Into<String>>(mut self, groups: I) -> Self {
        self.any_group.extend(collect_set(groups));
        self
    }

    pub fn or_any_permission<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        permissions: I,
    ) -> Self {
        self.any_permission.extend(collect_set(permissions));
        self
    }
}

// --- Content Audience ---

/// Visibility
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Visibility {
    #[default]
    Public,
    Authenticated,
    Restricted,
    Hide,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Authenticated => "authenticated",
            Visibility::Restricted => "restricted",
            Visibility::Hide => "hide",
        }
    }
}

/// AudienceSpec
///
/// The audience rules attached to one content item. A `restricted` item with
/// empty allow lists is visible to sysadmin only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AudienceSpec {
    pub visibility: Visibility,
    #[serde(default)]
    pub allow_roles: BTreeSet<RoleRef>,
    #[serde(default)]
    pub allow_groups: BTreeSet<GroupRef>,
}

// --- Decision Service Payloads ---

/// AuthorizeRequest
///
/// Input payload for a route decision (POST /v1/authorize).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    #[schema(example = "GET")]
    pub method: String,
    /// Request path, optionally with a query string.
    #[schema(example = "/api/nav/list")]
    pub path: String,
    #[serde(default)]
    pub context: Option<AccessContext>,
}

/// DenyReason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
}

/// AuthorizeResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthorizeResponse {
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub reason: Option<DenyReason>,
    /// HTTP status the caller should answer with (200, 401 or 403).
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub matched_template: Option<String>,
}

/// AudienceFilterRequest
///
/// Input payload for POST /v1/audience/filter.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudienceFilterRequest {
    /// Path of the audience sub-document (document store) or table alias (relational).
    #[schema(example = "audience")]
    pub prefix: String,
    #[serde(default)]
    pub context: Option<AccessContext>,
}

/// RelationalFilter
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RelationalFilter {
    /// WHERE fragment with `$1..$n` placeholders.
    pub sql: String,
    pub params: Vec<serde_json::Value>,
}

/// AudienceFilterResponse
///
/// `bypass` is true for sysadmin callers: no audience filter applies and both
/// lowered filters match everything.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudienceFilterResponse {
    pub bypass: bool,
    pub document: serde_json::Value,
    pub relational: RelationalFilter,
}

/// AudienceCheckRequest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudienceCheckRequest {
    #[serde(default)]
    pub context: Option<AccessContext>,
    pub audience: AudienceSpec,
}

/// AudienceCheckResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AudienceCheckResponse {
    pub visible: bool,
}

/// ResolveRequest
///
/// Input payload for POST /admin/permissions/resolve.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub user: User,
    #[serde(default)]
    pub source: Source,
}

/// ContentItem
///
/// A content row as stored in the relational `content` table, with its audience
/// split into id and slug columns.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow, Default)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub visibility: String,
    pub allow_role_ids: Vec<Uuid>,
    pub allow_role_slugs: Vec<String>,
    pub allow_group_ids: Vec<Uuid>,
    pub allow_group_slugs: Vec<String>,
}
