//! HTTP surface: router, handlers and request parsing

pub mod handler;
pub mod helpers;
pub mod parsing;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::ai::client::{LlmClient, SlidePlanner};
use crate::core::config::AppConfig;

/// Shared state for every request. Holds no per-request data.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub planner: Arc<dyn SlidePlanner>,
}

impl AppState {
    /// State backed by the real LLM client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let planner = Arc::new(LlmClient::new(Arc::clone(&config))?);
        Ok(Self { config, planner })
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handler::root))
        .route("/health", get(handler::health))
        .route("/providers", get(handler::providers))
        .route("/analyze-template", post(handler::analyze_template))
        .route("/outline", post(handler::outline))
        .route("/generate", post(handler::generate))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and run until the listener fails.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = AppState::new(config)?;
    let app = create_router(state);

    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
