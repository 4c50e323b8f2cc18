//! Chat endpoint

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ChatRequest, ChatResponse};

/// POST /chat - Answer from the uploaded documents only
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err(Error::InvalidRequest("message must not be empty".into()));
    }

    let response = state.engine().chat(&request).await?;
    Ok(Json(response))
}
