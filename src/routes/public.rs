use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints any client may call. The decision endpoints evaluate the context
/// carried in the request body, so exposing them leaks nothing the caller did
/// not already send.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /v1/authorize
        // Route decision against the platform matrix: allow, or 401/403 classification.
        .route("/v1/authorize", post(handlers::authorize))
        // POST /v1/audience/filter
        // The caller's visibility filter, lowered for the document and relational stores.
        .route("/v1/audience/filter", post(handlers::audience_filter))
        // POST /v1/audience/check
        // Visibility of a single item.
        .route("/v1/audience/check", post(handlers::audience_check))
        // GET /v1/content?kind=...&search=...
        // Content visible to the request's own caller (from the credential layer).
        .route("/v1/content", get(handlers::list_content))
}
