//! File storage
//!
//! A single `BlobStore` capability with one operation, `upload_blob`; callers
//! never branch on the backend. The local backend writes under a served
//! directory, the S3 backend targets any S3-compatible store.

mod local;
mod s3;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

pub use local::LocalStore;
pub use s3::S3Store;

/// Result of an upload: where the blob lives and what it is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    /// Publicly accessible URL, embedded in message content for file kinds
    pub url: String,
    /// Backend-internal path or key
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    /// Original file name as uploaded
    pub file_name: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_blob(
        &self,
        content: Vec<u8>,
        size: i64,
        file_name: &str,
        mime_type: &str,
    ) -> Result<BlobInfo>;
}

/// Build the configured backend.
pub async fn from_config(cfg: &StorageConfig) -> Result<Box<dyn BlobStore>> {
    match cfg.storage_type.as_str() {
        "local" => Ok(Box::new(LocalStore::new(&cfg.local_path, "/uploads")?)),
        "s3" => Ok(Box::new(S3Store::new(&cfg.s3).await?)),
        other => Err(AppError::Config(format!("unsupported storage.type '{other}'"))),
    }
}

/// Keep the original extension, replace the rest with a fresh uuid so blob
/// names never collide and never leak user-provided paths.
pub(crate) fn unique_blob_name(file_name: &str) -> String {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}{}", uuid::Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_names_keep_extension() {
        let name = unique_blob_name("report.PDF");
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.len(), 36 + 4);
    }

    #[test]
    fn unique_names_drop_suspicious_extensions() {
        let name = unique_blob_name("../../../etc/passwd");
        assert_eq!(name.len(), 36);
        let name = unique_blob_name("no-extension");
        assert_eq!(name.len(), 36);
    }

    #[test]
    fn unique_names_never_collide() {
        assert_ne!(unique_blob_name("a.txt"), unique_blob_name("a.txt"));
    }
}
