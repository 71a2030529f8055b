//! File upload handler
//!
//! Accepts a multipart form with a `file` field, enforces the configured
//! size cap with 413, and hands the bytes to the blob store. The returned
//! URL is what clients embed in file/image message content.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::api::middleware::AuthUser;
use crate::api::ApiState;
use crate::error::{AppError, Result};
use crate::storage::BlobInfo;

pub async fn upload(
    State(state): State<ApiState>,
    _auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<BlobInfo>> {
    let max_bytes = state.config.storage.max_file_size_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Input(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let content = field.bytes().await.map_err(|e| {
            // body-limit overruns surface as a field read error
            if e.to_string().to_lowercase().contains("length limit") {
                AppError::Oversize(format!(
                    "upload exceeds the {} MB limit",
                    state.config.storage.max_file_size_mb
                ))
            } else {
                AppError::Input(format!("reading upload: {e}"))
            }
        })?;

        if content.len() as u64 > max_bytes {
            return Err(AppError::Oversize(format!(
                "upload exceeds the {} MB limit",
                state.config.storage.max_file_size_mb
            )));
        }

        let size = content.len() as i64;
        let info = state
            .blob_store
            .upload_blob(content.to_vec(), size, &file_name, &mime_type)
            .await?;

        tracing::info!(file = %info.file_name, size, "file uploaded");
        return Ok(Json(info));
    }

    Err(AppError::Input("missing 'file' field".to_string()))
}
