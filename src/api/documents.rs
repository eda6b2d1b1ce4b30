//! Document upload and state reset

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use serde::Serialize;

use super::{ApiError, ApiState, MAX_UPLOAD_BYTES};
use crate::knowledge::DocumentKind;

/// Build the documents router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/upload_pdf", post(upload_document))
        .route("/clear_state", post(clear_state))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
}

/// Save an uploaded document and index it, replacing the previous one
async fn upload_document(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .and_then(|n| Path::new(n).file_name())
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Missing filename"))?;

        if DocumentKind::from_name(&filename).is_none() {
            tracing::warn!(file = %filename, "rejected upload with unsupported type");
            return Err(ApiError::bad_request(
                "Only PDF, TXT and MD files are supported",
            ));
        }

        upload = Some((filename, field.bytes().await?));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("Missing file field"))?;
    tracing::info!(file = %filename, bytes = bytes.len(), "received document upload");

    let saved = state.uploads_dir.join(&filename);
    tokio::fs::write(&saved, &bytes)
        .await
        .map_err(|e| ApiError::from(crate::Error::Io(e)))?;

    let indexed = state
        .assistant
        .upload_document(bytes.to_vec(), &filename)
        .await?;

    Ok(Json(UploadResponse {
        message: format!(
            "Document processed and indexed successfully ({} chunks)",
            indexed.chunks
        ),
        filename: indexed.name,
    }))
}

/// Clear state response
#[derive(Debug, Serialize)]
pub struct ClearStateResponse {
    pub message: &'static str,
    pub index_cleared: bool,
}

/// Drop the index and the conversation
async fn clear_state(State(state): State<Arc<ApiState>>) -> Json<ClearStateResponse> {
    tracing::info!("clearing application state");
    let index_cleared = state.assistant.clear_state().await;

    Json(ClearStateResponse {
        message: "Application state cleared successfully",
        index_cleared,
    })
}
