use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Decision engine: pure, synchronous and free of shared mutable state.
pub mod audience;
pub mod authorizer;
pub mod catalog;
pub mod lowering;
pub mod matrix;
pub mod models;
pub mod resolver;

// Service shell around the engine.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod repository;
pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

pub use audience::{PredicateNode, apply_audience, build_predicate, can_view};
pub use authorizer::{AccessDecision, RouteAuthorizer, RouteAuthorizerState, has_access};
pub use catalog::{CatalogSnapshot, CatalogState, GroupCatalog, RoleCatalog};
pub use config::AppConfig;
pub use matrix::{MatrixEntry, RoutePermissionMatrix};
pub use repository::{ContentState, PostgresRepository};
pub use resolver::{compute_effective_permissions, resolve_membership};

/// ApiDoc
///
/// The OpenAPI document of the decision service, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::authorize, handlers::audience_filter, handlers::audience_check,
        handlers::resolve_permissions, handlers::list_content, handlers::get_matrix,
        handlers::get_roles, handlers::get_groups
    ),
    components(
        schemas(
            models::AccessContext, models::Source, models::AccessRequirement, models::AccessLevel,
            models::AudienceSpec, models::Visibility, models::EntityRef, models::Role,
            models::Group, models::User, models::AuthorizeRequest, models::AuthorizeResponse,
            models::DenyReason, models::AudienceFilterRequest, models::AudienceFilterResponse,
            models::RelationalFilter, models::AudienceCheckRequest, models::AudienceCheckResponse,
            models::ResolveRequest, models::ContentItem, matrix::MatrixEntry,
        )
    ),
    tags(
        (name = "audience-gate", description = "Route authorization and content audience decisions")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request needs, built once at startup. Every member is
/// immutable and shared through `Arc`, so handlers never take a lock.
#[derive(Clone)]
pub struct AppState {
    /// Matrix of the platform being protected (consulted by `/v1/authorize`).
    pub platform_authorizer: RouteAuthorizerState,
    /// Matrix guarding this service's own admin routes.
    pub service_authorizer: RouteAuthorizerState,
    /// Role and group catalog snapshot.
    pub catalog: CatalogState,
    /// Content storage, when a database is configured.
    pub content: Option<ContentState>,
    pub config: AppConfig,
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routes, the admin guard and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Admin routes: every request is checked against the service matrix first.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::service_access_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
