//! Document management endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Document, DocumentList, IngestOutcome, ReindexReport};

/// Query parameters for upload
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Re-extract even if identical content is already registered
    #[serde(default)]
    pub force_reprocess: bool,
}

/// POST /documents/upload - Ingest one file from the multipart field `file`
pub async fn upload_document(
    State(state): State<AppState>,
    Query(params): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<IngestOutcome>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("failed to read multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| Error::InvalidRequest("upload has no filename".into()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("failed to read file: {e}")))?;

        tracing::info!("Received upload: {} ({} bytes)", filename, data.len());

        let outcome = state
            .engine()
            .ingest(&filename, &data, params.force_reprocess)
            .await?;
        return Ok(Json(outcome));
    }

    Err(Error::InvalidRequest("multipart field 'file' is required".into()))
}

/// GET /documents - All documents with statistics
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<DocumentList>> {
    Ok(Json(state.engine().list()?))
}

/// GET /documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>> {
    Ok(Json(state.engine().get(&id)?))
}

/// DELETE /documents/:id
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let document = state.engine().delete(&id).await?;
    Ok(Json(serde_json::json!({
        "deleted": true,
        "id": document.id,
        "filename": document.filename,
    })))
}

/// POST /documents/reindex
pub async fn reindex_documents(State(state): State<AppState>) -> Result<Json<ReindexReport>> {
    Ok(Json(state.engine().reindex_all().await?))
}
