use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use rust_lawgg_sync::config::Config;
use rust_lawgg_sync::db::Database;
use rust_lawgg_sync::db_storage::PgStore;
use rust_lawgg_sync::handlers::{self, ApiDoc, AppState};
use rust_lawgg_sync::sync_job::{SyncContext, SyncOrchestrator};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool and the sync
/// orchestrator, then serves the HTTP interface.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_lawgg_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let store = PgStore::new(db.pool.clone());
    let context = SyncContext::new(
        config.clone(),
        Arc::new(store.clone()),
        Arc::new(store),
    )?;
    let sync = SyncOrchestrator::new(context);
    tracing::info!("Sync orchestrator ready");

    let app_state = Arc::new(AppState::new(config.clone(), sync));

    // Sync trigger: 1 request/second per IP, burst of 5
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(1)
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let trigger_routes = Router::new()
        .route("/api/v1/sync", post(handlers::start_sync))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(16 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health and status bypass rate limiting so pollers are never throttled
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/sync/status", get(handlers::sync_status))
        .merge(trigger_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
