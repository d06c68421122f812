//! services/api/src/bin/api.rs

use analyzer_api_lib::{
    adapters::{DbAdapter, JsonSettingsStore, ReqwestTransport},
    config::Config,
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use document_analyzer_core::{
    AnalysisClient, AnalysisDesk, AnalysisKind, HealthMonitor, HistoryStore, HttpTransport,
};
use std::sync::Arc;
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
    info!("Configuration loaded. Starting analyzer service...");

    // --- 2. Open the History Database & Run Migrations ---
    info!("Opening history database at {}...", config.database_url);
    let db_adapter = DbAdapter::connect(&config.database_url).await?;
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");
    let store: Arc<dyn HistoryStore> = Arc::new(db_adapter);

    // --- 3. Initialize the Remote Service Client & Health Monitors ---
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    let client = AnalysisClient::new(transport.clone(), config.analyzer_url.clone());
    let monitor = HealthMonitor::new(transport, &config.analyzer_url)
        .with_timeout(config.health_timeout);

    // One poller per document page.
    let mut agreement_poller = monitor.start_polling(config.health_poll_interval);
    let mut resume_poller = monitor.start_polling(config.health_poll_interval);
    info!(
        "Polling {}/health every {:?}",
        config.analyzer_url, config.health_poll_interval
    );

    // --- 4. Build the Shared AppState ---
    let agreement_desk = Arc::new(AnalysisDesk::new(
        AnalysisKind::Agreement,
        client.clone(),
        store.clone(),
        agreement_poller.subscribe(),
    ));
    let resume_desk = Arc::new(AnalysisDesk::new(
        AnalysisKind::Resume,
        client,
        store,
        resume_poller.subscribe(),
    ));
    for desk in [&agreement_desk, &resume_desk] {
        let loaded = desk.load_history().await;
        info!("Loaded {} saved {} analyses", loaded.len(), desk.kind());
    }

    let app_state = Arc::new(AppState {
        agreement_desk,
        resume_desk,
        settings: Arc::new(JsonSettingsStore::new(config.settings_path.clone())),
    });

    // --- 5. Create the Web Router ---
    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state, cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested.");
        })
        .await?;

    // --- 7. Stop Health Polling ---
    agreement_poller.stop().await;
    resume_poller.stop().await;
    info!("Analyzer service stopped.");

    Ok(())
}
