//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, SearchIndexAdapter, TimetableIdCodec},
    config::Config,
    error::ApiError,
    web::{router, state::AppState, ApiDoc},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use timetable_core::{AcademicTerm, TimetableEngine};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let ids = Arc::new(
        TimetableIdCodec::new(config.sqids_alphabet.as_deref(), config.sqids_min_length)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    let search_adapter = Arc::new(
        SearchIndexAdapter::new(&config.search_service_url, config.search_timeout, ids.clone())
            .map_err(|e| ApiError::Internal(format!("Failed to build search client: {}", e)))?,
    );
    info!("Search index at {}", config.search_service_url);

    // --- 4. Build the Engine & Shared AppState ---
    let engine = Arc::new(TimetableEngine::new(
        db_adapter.clone(),
        db_adapter.clone(),
        search_adapter,
        AcademicTerm {
            acad_year: config.acad_year,
            semester: config.semester,
        },
    ));
    let app_state = Arc::new(AppState {
        engine,
        db: db_adapter,
        ids,
    });

    let frontend_origin = config.frontend_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid FRONTEND_URL '{}': {}", config.frontend_url, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(router(app_state))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
