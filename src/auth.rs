use axum::{
    extract::{FromRef, FromRequestParts, OriginalUri, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    authorizer::{AccessDecision, RouteAuthorizer},
    config::{AppConfig, Env},
    models::AccessContext,
};

/// Header carrying a JSON `AccessContext`, honoured in `Env::Local` only.
pub const ACCESS_CONTEXT_HEADER: &str = "x-access-context";

/// Caller
///
/// The resolved identity of a request, or `None` for anonymous callers.
///
/// The credential layer in front of this service verifies tokens and inserts
/// the resulting `AccessContext` into the request extensions; this extractor
/// only reads it. Extraction never rejects an anonymous request: whether
/// anonymity is acceptable is the route authorizer's decision.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<AccessContext>);

impl Caller {
    pub fn context(&self) -> Option<&AccessContext> {
        self.0.as_ref()
    }
}

/// Caller Extractor Implementation
///
/// 1. Request extensions: the context inserted by the credential layer.
/// 2. Local bypass: in `Env::Local`, a JSON context in the `x-access-context`
///    header. A header that does not parse is a 400, not a silent anonymous call.
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AccessContext>() {
            return Ok(Caller(Some(context.clone())));
        }

        let config = AppConfig::from_ref(state);
        if config.env == Env::Local {
            if let Some(header) = parts.headers.get(ACCESS_CONTEXT_HEADER) {
                let context = header
                    .to_str()
                    .ok()
                    .and_then(|raw| serde_json::from_str::<AccessContext>(raw).ok())
                    .ok_or_else(|| {
                        tracing::debug!("malformed {} header", ACCESS_CONTEXT_HEADER);
                        StatusCode::BAD_REQUEST
                    })?;
                return Ok(Caller(Some(context)));
            }
        }

        Ok(Caller(None))
    }
}

impl From<AccessDecision> for StatusCode {
    fn from(decision: AccessDecision) -> Self {
        match decision {
            AccessDecision::Allow => StatusCode::OK,
            AccessDecision::DenyUnauthenticated => StatusCode::UNAUTHORIZED,
            AccessDecision::DenyForbidden => StatusCode::FORBIDDEN,
        }
    }
}

/// enforce_route_access
///
/// Runs the request through `authorizer` and either forwards it or answers
/// 401/403. Uses the original (un-nested) URI so matrix templates are written
/// against full paths.
pub async fn enforce_route_access(
    authorizer: &RouteAuthorizer,
    caller: &Caller,
    request: Request,
    next: Next,
) -> Response {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let path = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());

    let decision = authorizer
        .authorize(request.method().as_str(), path, caller.context())
        .decision;

    match decision {
        AccessDecision::Allow => next.run(request).await,
        denied => StatusCode::from(denied).into_response(),
    }
}

/// service_access_middleware
///
/// Guards the service's own administrative routes with the service matrix.
pub async fn service_access_middleware(
    State(state): State<AppState>,
    caller: Caller,
    request: Request,
    next: Next,
) -> Response {
    enforce_route_access(&state.service_authorizer, &caller, request, next).await
}
