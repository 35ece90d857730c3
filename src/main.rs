//! Shear Capacity Prediction Server
//!
//! Serves a gradient boosted regression model with per-request SHAP
//! explanations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SHEAR CAPACITY SERVER                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  HTTP     │  │  Inference       │  │  Render         │  │
//! │  │  (Axum)   │─▶│  scaler → trees  │─▶│  HTML + PNG     │  │
//! │  │           │  │  → TreeSHAP      │  │  force plot     │  │
//! │  └───────────┘  └────────▲─────────┘  └─────────────────┘  │
//! │                          │ loaded once                      │
//! │                ┌─────────┴─────────┐                        │
//! │                │ model + scaler    │                        │
//! │                │ JSON artifacts    │                        │
//! │                └───────────────────┘                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod artifacts;
mod config;
mod error;
mod handlers;
mod inference;
mod models;
mod render;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

use artifacts::ArtifactManifest;
use inference::InferenceContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    init_tracing(&config);

    tracing::info!("Shear capacity server starting ({})...", config.environment);

    // Load artifacts; any failure here stops the process
    let (context, manifest) = artifacts::load_context(&config)
        .context("Failed to load model artifacts")?;

    let state = AppState {
        context: Arc::new(context),
        manifest: Arc::new(manifest),
        config: config.clone(),
    };

    let app = create_router(state);

    let addr = config.bind_addr();
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing(config: &config::Config) {
    let default_filter = if config.is_production() {
        "shear_server=info,tower_http=info"
    } else {
        "shear_server=debug,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<InferenceContext>,
    pub manifest: Arc<ArtifactManifest>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home::index))
        .route("/health", get(handlers::health::check))
        .route("/predict_api", post(handlers::predict::predict_api))
        .route("/predict", post(handlers::predict::predict_form))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
