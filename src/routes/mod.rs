/// Router Module Index
///
/// The decision service exposes two tiers. Public routes carry decisions
/// computed from the caller-supplied context and need no guard of their own.
/// Admin routes expose catalog and matrix internals and are guarded by the
/// service's own route matrix through the route-access middleware.

/// Health and decision endpoints.
pub mod public;

/// Catalog and matrix inspection, guarded by `admin::service_matrix`.
pub mod admin;
