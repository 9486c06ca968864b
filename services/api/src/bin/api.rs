//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{HttpMetadataFetcher, OpenAiEmbeddingAdapter, OpenAiInsightAdapter},
    config::Config,
    error::ApiError,
    storage::connect_store,
    web::{self, middleware::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_NAME_HEADER}, ApiDoc, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
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

    // --- 2. Connect the Storage Backend ---
    let store = connect_store(&config.storage_mode()).await?;
    info!("Storage backend ready: {}", store.kind().as_str());

    // --- 3. Initialize Service Adapters ---
    let openai_client = match config.openai_api_key.as_ref() {
        Some(key) => Some(Client::with_config(OpenAIConfig::new().with_api_key(key))),
        None => {
            warn!("OPENAI_API_KEY is not set; search is lexical only and insights use bullet summaries.");
            None
        }
    };
    let embedder = Arc::new(OpenAiEmbeddingAdapter::new(
        openai_client.clone(),
        config.embed_model.clone(),
    ));
    let summarizer = Arc::new(OpenAiInsightAdapter::new(
        openai_client,
        config.summary_model.clone(),
    ));
    let fetcher = Arc::new(
        HttpMetadataFetcher::new(config.fetch_timeout)
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?,
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        store,
        fetcher,
        embedder,
        summarizer,
    ));

    // --- 5. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_EMAIL_HEADER),
            HeaderName::from_static(USER_NAME_HEADER),
        ]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

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
