mod handlers;
mod pages;
mod types;

pub use handlers::{AppState, status_for};
pub use types::{ClassifyApiResponse, CritiqueApiResponse, ErrorResponse, HealthResponse};

use crate::{Result, config::Config, llm, vision};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(handlers::index))
        .route("/critique", get(handlers::critique_page))
        .route("/classify", get(handlers::classify_page))
        .route("/api/critique", post(handlers::critique))
        .route("/api/classify", post(handlers::classify))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let llm = llm::connect(&config.llm);

    // A configured but unloadable model is fatal here rather than per request.
    let classifier = vision::load_classifier(&config.classifier).await?;

    let app_state = AppState {
        llm,
        critique: Arc::new(config.critique.clone()),
        classifier,
        top_k: config.classifier.top_k,
        max_upload_bytes: config.server.max_upload_bytes,
    };

    let app = router(app_state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
