//! S3-compatible blob store

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;

use super::{unique_blob_name, BlobInfo, BlobStore};
use crate::config::S3Config;
use crate::error::{AppError, Result};

pub struct S3Store {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl S3Store {
    pub async fn new(cfg: &S3Config) -> Result<Self> {
        use aws_config::BehaviorVersion;
        use aws_sdk_s3::config::{Credentials, Region};

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()));

        if !cfg.access_key_id.is_empty() {
            builder = builder.credentials_provider(Credentials::new(
                &cfg.access_key_id,
                &cfg.secret_access_key,
                None,
                None,
                "ripple-s3",
            ));
        }
        // Custom endpoint for MinIO and friends
        if !cfg.endpoint.is_empty() {
            builder = builder.endpoint_url(&cfg.endpoint).force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());

        let public_url = if cfg.public_url.is_empty() {
            format!("https://{}.s3.{}.amazonaws.com", cfg.bucket, cfg.region)
        } else {
            cfg.public_url.trim_end_matches('/').to_string()
        };

        Ok(Self {
            client,
            bucket: cfg.bucket.clone(),
            public_url,
        })
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn upload_blob(
        &self,
        content: Vec<u8>,
        size: i64,
        file_name: &str,
        mime_type: &str,
    ) -> Result<BlobInfo> {
        use aws_sdk_s3::primitives::ByteStream;

        if content.len() as i64 != size {
            return Err(AppError::Storage(format!(
                "size mismatch: declared {size}, got {}",
                content.len()
            )));
        }

        let key = format!("uploads/{}", unique_blob_name(file_name));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("s3 upload failed: {e}")))?;

        Ok(BlobInfo {
            url: format!("{}/{}", self.public_url, key),
            path: key,
            size,
            mime_type: mime_type.to_string(),
            file_name: file_name.to_string(),
        })
    }
}
