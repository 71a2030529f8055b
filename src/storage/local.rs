//! Local filesystem blob store
//!
//! Blobs land under `base_path` with uuid names; the API server serves the
//! directory at `base_url` so the returned URL is directly fetchable.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{unique_blob_name, BlobInfo, BlobStore};
use crate::error::{AppError, Result};

pub struct LocalStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStore {
    pub fn new(base_path: &str, base_url: &str) -> Result<Self> {
        std::fs::create_dir_all(base_path).map_err(|e| {
            AppError::Storage(format!("creating upload directory '{base_path}': {e}"))
        })?;
        Ok(Self {
            base_path: PathBuf::from(base_path),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn upload_blob(
        &self,
        content: Vec<u8>,
        size: i64,
        file_name: &str,
        mime_type: &str,
    ) -> Result<BlobInfo> {
        if content.len() as i64 != size {
            return Err(AppError::Storage(format!(
                "size mismatch: declared {size}, got {}",
                content.len()
            )));
        }

        let blob_name = unique_blob_name(file_name);
        let path = self.base_path.join(&blob_name);

        tokio::fs::write(&path, &content)
            .await
            .map_err(|e| AppError::Storage(format!("writing blob: {e}")))?;

        Ok(BlobInfo {
            url: format!("{}/{}", self.base_url, blob_name),
            path: path.to_string_lossy().into_owned(),
            size,
            mime_type: mime_type.to_string(),
            file_name: file_name.to_string(),
        })
    }
}
