//! Document chat server binary
//!
//! Run with: cargo run -p docchat-rag --bin docchat-rag-server

use docchat_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docchat_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data dir: {}", config.storage.data_dir.display());
    tracing::info!(
        "  - Embedding model: {} ({} dims)",
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - Chat model: {}", config.llm.chat_model);
    tracing::info!(
        "  - Chunking: {} {:?} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.unit,
        config.chunking.chunk_overlap
    );
    tracing::info!(
        "  - Retrieval: top {} at threshold {}",
        config.retrieval.top_k,
        config.retrieval.similarity_threshold
    );
    tracing::info!(
        "  - OCR: {}, vision: {}",
        config.extraction.ocr_enabled,
        config.extraction.vision_enabled
    );

    let server = RagServer::new(config)?;

    match server.engine().health().await {
        Ok(health) if health.generation_available => {
            tracing::info!("Ollama is running at {}", server.config().llm.base_url);
        }
        _ => {
            tracing::warn!("Ollama not available at {}", server.config().llm.base_url);
            tracing::warn!("Start it with `ollama serve` and pull the configured models");
        }
    }

    server.start().await?;
    Ok(())
}
