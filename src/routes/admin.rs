use crate::{
    AppState, handlers,
    matrix::{MatrixEntry, MatrixError, RoutePermissionMatrix},
    models::AccessRequirement,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Permission required to read the service's configuration.
pub const ACCESS_READ_PERMISSION: &str = "access:read";

/// service_matrix
///
/// The route matrix guarding this service's own admin endpoints. Templates are
/// full paths since the middleware matches on the original URI.
pub fn service_matrix() -> Result<RoutePermissionMatrix, MatrixError> {
    let read =
        || AccessRequirement::any_permission([ACCESS_READ_PERMISSION]).or_any_role(["admin"]);

    RoutePermissionMatrix::builder()
        .entry(
            MatrixEntry::new("GET", "/admin/matrix", read())
                .describe("Platform route matrix"),
        )
        .get("/admin/roles", read())
        .get("/admin/groups", read())
        .post("/admin/permissions/resolve", read())
        .build()
}

/// Admin Router Module
///
/// Read-only inspection of what the service loaded at startup. The whole
/// router is wrapped in `service_access_middleware` by `create_router`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/matrix
        // The platform route matrix in registration order.
        .route("/matrix", get(handlers::get_matrix))
        // GET /admin/roles
        .route("/roles", get(handlers::get_roles))
        // GET /admin/groups
        .route("/groups", get(handlers::get_groups))
        // POST /admin/permissions/resolve
        // Role/group aggregation into an access context, for credential issuance.
        .route("/permissions/resolve", post(handlers::resolve_permissions))
}
