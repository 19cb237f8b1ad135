//! HTTP API gateway for ActionWire.
//!
//! Exposes the chat endpoint a web or voice client talks to, plus a health
//! check. Built on Axum.

pub mod chat;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use actionwire_agent::{Pipeline, PipelineSettings};

pub use chat::{ApiError, ChatRequest, ChatResponse, ErrorResponse};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: Arc<Pipeline>,
}

pub type SharedState = Arc<GatewayState>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Layers applied to every route.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub request_timeout: Duration,
    pub allowed_origins: Vec<String>,
}

impl RouterOptions {
    pub fn from_config(config: &actionwire_config::GatewayConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            allowed_origins: config.allowed_origins.clone(),
        }
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from_config(&actionwire_config::GatewayConfig::default())
    }
}

/// Build the Axum router with all gateway routes.
///
/// - Request body size limit (1 MB)
/// - Whole-request timeout (408 when exceeded)
/// - CORS restricted to the configured origins
/// - HTTP trace logging
pub fn build_router(state: SharedState, options: &RouterOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(parse_origins(&options.allowed_origins)))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat::chat_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(options.request_timeout))
                .layer(DefaultBodyLimit::max(1024 * 1024)),
        )
}

fn parse_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect()
}

/// Wire the pipeline's collaborators from configuration.
pub fn pipeline_from_config(
    config: &actionwire_config::AppConfig,
) -> Result<Pipeline, BoxError> {
    config.require_credentials()?;

    let router = actionwire_providers::router::build_from_config(config);
    let provider = router
        .default()
        .ok_or("No default provider configured. Set an API key")?;
    let tools = actionwire_toolkit::backend_from_config(&config.tools)?;

    Ok(Pipeline::new(
        provider,
        tools,
        PipelineSettings::from_config(config),
    ))
}

/// Start the gateway HTTP server.
pub async fn start(config: actionwire_config::AppConfig) -> Result<(), BoxError> {
    let pipeline = Arc::new(pipeline_from_config(&config)?);
    let state = Arc::new(GatewayState { pipeline });
    let app = build_router(state, &RouterOptions::from_config(&config.gateway));

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    info!(addr = %addr, model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
