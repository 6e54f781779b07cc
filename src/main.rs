use audience_gate::{
    AppState,
    authorizer::RouteAuthorizer,
    catalog::CatalogSnapshot,
    config::{AppConfig, Env},
    create_router,
    matrix::RoutePermissionMatrix,
    repository::{CatalogRepository, ContentState, PostgresRepository},
    routes::admin::service_matrix,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, the catalog and both route matrices, then serves the
/// decision API. Any startup failure is fatal: the service never runs with a
/// half-loaded rule set.
#[tokio::main]
async fn main() {
    // 1. Configuration
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "audience_gate=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Catalog and content storage
    // With a database, the catalog comes from Postgres and content listing is
    // enabled. Without one, the catalog comes from CATALOG_PATH (or is empty).
    let (catalog, content) = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = Arc::new(PostgresRepository::new(pool));
            let catalog = repo
                .load_catalog()
                .await
                .expect("FATAL: Failed to load the role catalog from Postgres.");

            (catalog, Some(repo as ContentState))
        }
        None => {
            let catalog = match &config.catalog_path {
                Some(path) => CatalogSnapshot::from_file(path)
                    .expect("FATAL: Failed to load CATALOG_PATH."),
                None => {
                    tracing::warn!("no DATABASE_URL or CATALOG_PATH; starting with an empty catalog");
                    CatalogSnapshot::default()
                }
            };
            (catalog, None)
        }
    };

    tracing::info!(
        roles = catalog.roles().len(),
        groups = catalog.groups().len(),
        "catalog ready"
    );

    // 4. Route matrices
    let platform_matrix = match &config.route_matrix_path {
        Some(path) => RoutePermissionMatrix::from_file(path, config.allow_ambiguous_routes)
            .expect("FATAL: Failed to load ROUTE_MATRIX_PATH."),
        None => {
            tracing::warn!("no ROUTE_MATRIX_PATH; every platform route will be unmatched");
            RoutePermissionMatrix::default()
        }
    };
    tracing::info!(routes = platform_matrix.entries().len(), "platform route matrix loaded");

    let service_matrix = service_matrix().expect("FATAL: Invalid service route matrix.");

    // 5. State assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        platform_authorizer: Arc::new(RouteAuthorizer::new(platform_matrix)),
        service_authorizer: Arc::new(RouteAuthorizer::new(service_matrix)),
        catalog: Arc::new(catalog),
        content,
        config,
    };

    // 6. Router and server startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
