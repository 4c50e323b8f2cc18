//! API routes for the document chat server

pub mod chat;
pub mod documents;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::HealthStatus;

/// Build all routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(info))
        .route("/health", get(health))
        .route("/models", get(models))
        .route("/chat", post(chat::chat))
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/documents/reindex", post(documents::reindex_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "docchat-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Private document Q&A answering only from uploaded documents",
        "endpoints": {
            "GET /health": "Generation service reachability and index size",
            "GET /models": "Models available on the Ollama server",
            "POST /chat": "Ask a question about the uploaded documents",
            "POST /documents/upload": "Upload a document (multipart field 'file')",
            "GET /documents": "List documents with statistics",
            "GET /documents/:id": "Get one document",
            "DELETE /documents/:id": "Delete a document and its fragments",
            "POST /documents/reindex": "Re-embed every stored fragment"
        }
    }))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Result<Json<HealthStatus>> {
    Ok(Json(state.engine().health().await?))
}

/// GET /models
async fn models(State(state): State<AppState>) -> Json<serde_json::Value> {
    let models = state.engine().available_models().await;
    Json(serde_json::json!({ "models": models }))
}
