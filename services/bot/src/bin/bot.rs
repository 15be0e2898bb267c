//! services/bot/src/bin/bot.rs

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use axum::Router;
use bot_lib::{
    adapters::{connect_session_store, HttpRegistrationClient, LogDispatcher, WebhookDispatcher},
    config::Config,
    error::ApiError,
    web::{rest::ApiDoc, router, AppState},
};
use lead_bot_core::{DialogueEngine, DialogueMessages, MessageDispatcher};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
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
    info!("Configuration loaded. Starting lead registration bot...");

    // --- 2. Pick the Session Store ---
    let store = connect_session_store(&config).await;
    info!(backend = store.backend_name(), "Session store ready.");

    // --- 3. Initialize Service Adapters ---
    let messages = DialogueMessages::default();
    let http_client = reqwest::Client::builder()
        .timeout(config.registration_timeout)
        .build()?;

    let registration = Arc::new(HttpRegistrationClient::new(
        http_client.clone(),
        config.registration_url.clone(),
        messages.registration_success.clone(),
    ));

    let dispatcher: Arc<dyn MessageDispatcher> = match config.channel_gateway_url.as_deref() {
        Some(url) => {
            info!("Outbound replies are pushed to {}", url);
            Arc::new(WebhookDispatcher::new(http_client.clone(), url))
        }
        None => {
            info!("CHANNEL_GATEWAY_URL is not set; outbound replies are only logged.");
            Arc::new(LogDispatcher)
        }
    };

    // --- 4. Build the Dialogue Engine & Shared AppState ---
    let engine = DialogueEngine::new(store, registration, dispatcher)
        .with_messages(messages)
        .with_registration_timeout(config.registration_timeout);
    let app_state = Arc::new(AppState::new(Arc::new(engine), config.clone()));

    // --- 5. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .merge(router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    if config.admin_token.is_none() {
        info!("ADMIN_TOKEN is not set; admin endpoints will refuse every request.");
    }
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
