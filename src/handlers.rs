use crate::{
    AppState,
    audience::{build_predicate, can_view},
    auth::Caller,
    lowering::{document::to_document_filter, relational::to_sql_fragment},
    matrix::MatrixEntry,
    models::{
        AccessContext, AudienceCheckRequest, AudienceCheckResponse, AudienceFilterRequest,
        AudienceFilterResponse, AuthorizeRequest, AuthorizeResponse, ContentItem, Group,
        RelationalFilter, ResolveRequest, Role,
    },
    repository::ContentFilter,
    resolver::resolve_membership,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde_json::json;

/// Accepts audience prefixes made of identifier characters and dots only.
fn valid_prefix(prefix: &str) -> bool {
    prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

// --- Decision Handlers ---

/// authorize
///
/// [Public Route] Takes a route decision against the platform's route matrix.
/// Answers 200 with the decision in the body; the caller owns the actual
/// 401/403 response.
#[utoipa::path(
    post,
    path = "/v1/authorize",
    request_body = AuthorizeRequest,
    responses((status = 200, description = "Route decision", body = AuthorizeResponse))
)]
pub async fn authorize(
    State(state): State<AppState>,
    Json(payload): Json<AuthorizeRequest>,
) -> Json<AuthorizeResponse> {
    let route = state.platform_authorizer.authorize(
        &payload.method,
        &payload.path,
        payload.context.as_ref(),
    );

    Json(AuthorizeResponse {
        allow: route.decision.is_allowed(),
        reason: route.decision.reason(),
        status: route.decision.status_code(),
        matched_template: route.entry.map(|entry| entry.path_template.clone()),
    })
}

/// audience_filter
///
/// [Public Route] Builds the caller's visibility filter and returns it lowered
/// for both storage engines.
#[utoipa::path(
    post,
    path = "/v1/audience/filter",
    request_body = AudienceFilterRequest,
    responses(
        (status = 200, description = "Lowered filters", body = AudienceFilterResponse),
        (status = 400, description = "Invalid prefix")
    )
)]
pub async fn audience_filter(
    Json(payload): Json<AudienceFilterRequest>,
) -> Result<Json<AudienceFilterResponse>, StatusCode> {
    if !valid_prefix(&payload.prefix) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let response = match build_predicate(&payload.prefix, payload.context.as_ref()) {
        None => AudienceFilterResponse {
            bypass: true,
            document: json!({}),
            relational: RelationalFilter {
                sql: "TRUE".to_string(),
                params: vec![],
            },
        },
        Some(predicate) => {
            let (sql, params) = to_sql_fragment(&predicate).render(1);
            AudienceFilterResponse {
                bypass: false,
                document: to_document_filter(&predicate),
                relational: RelationalFilter {
                    sql,
                    params: params.iter().map(|p| p.to_json()).collect(),
                },
            }
        }
    };

    Ok(Json(response))
}

/// audience_check
///
/// [Public Route] Whether one already loaded item is visible to the caller.
#[utoipa::path(
    post,
    path = "/v1/audience/check",
    request_body = AudienceCheckRequest,
    responses((status = 200, description = "Visibility", body = AudienceCheckResponse))
)]
pub async fn audience_check(
    Json(payload): Json<AudienceCheckRequest>,
) -> Json<AudienceCheckResponse> {
    Json(AudienceCheckResponse {
        visible: can_view(payload.context.as_ref(), &payload.audience),
    })
}

/// resolve_permissions
///
/// [Admin Route] Resolves a user's assignments against the catalog into the
/// access context a credential issuer embeds. Exposes catalog ids, so it sits
/// behind the service matrix with the other catalog views.
#[utoipa::path(
    post,
    path = "/admin/permissions/resolve",
    request_body = ResolveRequest,
    responses((status = 200, description = "Resolved context", body = AccessContext))
)]
pub async fn resolve_permissions(
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> Json<AccessContext> {
    let catalog = state.catalog.as_ref();
    let membership = resolve_membership(&payload.user, catalog, catalog);
    Json(membership.into_context(payload.source))
}

/// list_content
///
/// [Public Route] Lists content visible to the caller, combining the query
/// filters with the caller's audience clause.
#[utoipa::path(
    get,
    path = "/v1/content",
    params(ContentFilter),
    responses(
        (status = 200, description = "Visible content", body = [ContentItem]),
        (status = 503, description = "No content storage configured")
    )
)]
pub async fn list_content(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<ContentFilter>,
) -> Result<Json<Vec<ContentItem>>, StatusCode> {
    let content = state.content.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let items = content.list_content(filter, caller.context()).await;
    Ok(Json(items))
}

// --- Admin Handlers ---

/// get_matrix
///
/// [Admin Route] The platform route matrix in registration order.
#[utoipa::path(
    get,
    path = "/admin/matrix",
    responses(
        (status = 200, description = "Route matrix", body = [MatrixEntry]),
        (status = 401, description = "No access context"),
        (status = 403, description = "Missing access:read")
    )
)]
pub async fn get_matrix(State(state): State<AppState>) -> Json<Vec<MatrixEntry>> {
    Json(state.platform_authorizer.matrix().entries().to_vec())
}

/// get_roles
///
/// [Admin Route] Every role in the loaded catalog.
#[utoipa::path(
    get,
    path = "/admin/roles",
    responses((status = 200, description = "Roles", body = [Role]))
)]
pub async fn get_roles(State(state): State<AppState>) -> Json<Vec<Role>> {
    Json(state.catalog.roles().to_vec())
}

/// get_groups
///
/// [Admin Route] Every group in the loaded catalog.
#[utoipa::path(
    get,
    path = "/admin/groups",
    responses((status = 200, description = "Groups", body = [Group]))
)]
pub async fn get_groups(State(state): State<AppState>) -> Json<Vec<Group>> {
    Json(state.catalog.groups().to_vec())
}
