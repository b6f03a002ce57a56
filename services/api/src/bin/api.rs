//! services/api/src/bin/api.rs

use activity_planner_core::{ActivityRepository, ProviderCoordinator};
use api_lib::{
    adapters::{
        DeepSeekAdapter, GeminiAdapter, InMemoryActivityStore, OpenAiChatAdapter,
        PdfOxideExtractor, PgActivityStore,
    },
    config::Config,
    error::ApiError,
    web::{router, ApiDoc, AppState},
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
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

    // --- 2. Choose the Activity Store ---
    let activities: Arc<dyn ActivityRepository> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let store = PgActivityStore::new(db_pool);
            info!("Running database migrations...");
            store.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, activities are kept in memory only");
            Arc::new(InMemoryActivityStore::new())
        }
    };

    // --- 3. Initialize Provider Adapters ---
    // One HTTP client is shared by every adapter; keys are attached per request.
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let mut coordinator = ProviderCoordinator::new(config.request_timeout)
        .with_provider(Arc::new(OpenAiChatAdapter::openai(
            http.clone(),
            config.openai.clone(),
            config.generation,
        )))
        .with_provider(Arc::new(OpenAiChatAdapter::groq(
            http.clone(),
            config.groq.clone(),
            config.generation,
        )))
        .with_provider(Arc::new(GeminiAdapter::new(
            http.clone(),
            config.gemini.clone(),
            config.generation,
        )))
        .with_provider(Arc::new(DeepSeekAdapter::new(
            http,
            config.deepseek.clone(),
            config.generation,
        )))
        .with_demo_mode(config.demo_mode);
    for provider in &config.disabled_providers {
        warn!(%provider, "Provider disabled by configuration");
        coordinator = coordinator.with_disabled(*provider);
    }
    if config.demo_mode {
        warn!("DEMO_MODE is on: activities are generated offline and labeled as demo content");
    }

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        coordinator: Arc::new(coordinator),
        activities,
        pdf_extractor: Arc::new(PdfOxideExtractor::new()),
    });

    // --- 5. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
