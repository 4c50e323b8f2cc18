//! HTTP server over the engine

pub mod routes;
pub mod state;

use axum::{http::HeaderValue, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::engine::RagEngine;
use crate::error::{Error, Result};
use state::AppState;

/// Document chat HTTP server
pub struct RagServer {
    config: RagConfig,
    engine: Arc<RagEngine>,
}

impl RagServer {
    /// Build the engine from configuration and wrap it
    pub fn new(config: RagConfig) -> Result<Self> {
        let engine = Arc::new(RagEngine::new(config.clone())?);
        Ok(Self { config, engine })
    }

    pub fn with_engine(engine: Arc<RagEngine>) -> Self {
        Self {
            config: engine.config().clone(),
            engine,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<RagEngine> {
        &self.engine
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            .merge(routes::api_routes(self.config.server.max_upload_size))
            .with_state(AppState::new(self.engine.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.server.cors_origins))
    }

    /// Serve until Ctrl+C, then tear the engine down
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::InvalidConfiguration(format!("invalid address: {e}")))?;

        let router = self.build_router();

        tracing::info!("Starting document chat server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(format!("server error: {e}")))?;

        self.engine.shutdown();
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Allow the configured origins; `*` or an empty list allows any
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
