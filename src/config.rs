use std::env;

/// AppConfig
///
/// Holds the decision service's configuration. Loaded once at startup and
/// never mutated; it is pulled into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local context header bypass.
    pub env: Env,
    // Address the HTTP server binds to.
    pub bind_addr: String,
    // JSON file holding the platform's route permission matrix.
    pub route_matrix_path: Option<String>,
    // JSON file holding the role and group catalog (used without a database).
    pub catalog_path: Option<String>,
    // Postgres connection string. Enables catalog loading and content listing.
    pub db_url: Option<String>,
    // Keep first-match semantics for overlapping route templates instead of failing.
    pub allow_ambiguous_routes: bool,
}

/// Env
///
/// The runtime context. `Local` accepts an access context straight from the
/// `x-access-context` header; `Production` only trusts the credential layer.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// A local configuration with no files and no database, used for test setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            route_matrix_path: None,
            catalog_path: None,
            db_url: None,
            allow_ambiguous_routes: false,
        }
    }
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics in production when `ROUTE_MATRIX_PATH` is not set: a decision
    /// service without a route table would deny every authenticated-only route
    /// and allow nothing meaningful.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let route_matrix_path = match env {
            Env::Production => Some(
                env::var("ROUTE_MATRIX_PATH")
                    .expect("FATAL: ROUTE_MATRIX_PATH must be set in production."),
            ),
            Env::Local => env::var("ROUTE_MATRIX_PATH").ok(),
        };

        Self {
            env,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            route_matrix_path,
            catalog_path: env::var("CATALOG_PATH").ok(),
            db_url: env::var("DATABASE_URL").ok(),
            allow_ambiguous_routes: flag("ALLOW_AMBIGUOUS_ROUTES"),
        }
    }
}
