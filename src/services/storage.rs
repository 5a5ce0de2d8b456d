/// S3 storage gateway
///
/// Issues time-limited upload and playback URLs and moves artifact bytes for
/// the encode worker and the HLS proxy. Keys are hierarchical:
/// `videos/raw/{id}.mp4`, `videos/hls/{id}/...`, `videos/thumbs/{id}.jpg`.
use crate::config::S3Config;
use crate::error::{AppError, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub fn raw_key(video_id: Uuid) -> String {
    format!("videos/raw/{video_id}.mp4")
}

pub fn hls_prefix(video_id: Uuid) -> String {
    format!("videos/hls/{video_id}/")
}

pub fn thumbnail_key(video_id: Uuid) -> String {
    format!("videos/thumbs/{video_id}.jpg")
}

pub fn content_type_for(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Thin client over the S3 SDK scoped to the service bucket
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    config: S3Config,
}

impl StorageClient {
    /// Initialize the AWS client from config (explicit credentials when
    /// provided, default chain otherwise; custom endpoint for MinIO)
    pub async fn new(config: S3Config) -> Result<Self> {
        use aws_sdk_s3::config::Region;

        let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            use aws_sdk_s3::config::Credentials;

            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "pawreel_media_s3",
            );
            builder = builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let aws_config = builder.load().await;
        Ok(Self {
            client: Client::new(&aws_config),
            config,
        })
    }

    /// Presigned PUT URL for a direct client upload
    pub async fn presign_upload(&self, key: &str, ttl: Duration, content_type: &str) -> Result<String> {
        let presigning = PresigningConfig::builder()
            .expires_in(ttl)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create presigning config: {e}")))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign upload URL: {e}")))?;

        Ok(request.uri().to_string())
    }

    /// Presigned GET URL for playback artifacts
    pub async fn presign_playback(&self, key: &str, ttl: Duration) -> Result<String> {
        let presigning = PresigningConfig::builder()
            .expires_in(ttl)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create presigning config: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign playback URL: {e}")))?;

        Ok(request.uri().to_string())
    }

    /// HeadObject existence check without downloading
    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("404") || msg.contains("NotFound") {
                    Ok(false)
                } else {
                    Err(AppError::Storage(format!("Failed to check object: {e}")))
                }
            }
        }
    }

    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("NoSuchKey") || msg.contains("404") {
                    AppError::NotFound(format!("Object not found: {key}"))
                } else {
                    AppError::Storage(format!("Failed to download object: {e}"))
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read object body: {e}")))?
            .into_bytes();

        Ok(bytes.to_vec())
    }

    /// Download an object to a local file (staging for the encode worker)
    pub async fn download_to_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let bytes = self.get_object(key).await?;
        tokio::fs::write(local_path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write staged file: {e}")))?;
        Ok(())
    }

    /// Upload a local file (transcoded artifacts are immutable, long cache)
    pub async fn upload_file(&self, local_path: &Path, key: &str, content_type: &str) -> Result<()> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            AppError::Storage(format!("Failed to read {}: {e}", local_path.display()))
        })?;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .cache_control("max-age=31536000")
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload {key}: {e}")))?;

        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete {key}: {e}")))?;

        Ok(())
    }

    /// Delete every object under a prefix (HLS output directories)
    pub async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let listing = request
                .send()
                .await
                .map_err(|e| AppError::Storage(format!("Failed to list {prefix}: {e}")))?;

            for object in listing.contents() {
                if let Some(key) = object.key() {
                    self.delete_object(key).await?;
                    deleted += 1;
                }
            }

            match listing.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(deleted)
    }

    /// Startup connectivity check; encoding depends entirely on the bucket
    pub async fn health_check(&self) -> Result<()> {
        self.client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "S3 health check failed for bucket {}: {e}",
                    self.config.bucket
                ))
            })?;

        tracing::info!(
            bucket = %self.config.bucket,
            region = %self.config.region,
            "S3 connection validated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            raw_key(id),
            "videos/raw/00000000-0000-0000-0000-000000000000.mp4"
        );
        assert_eq!(
            hls_prefix(id),
            "videos/hls/00000000-0000-0000-0000-000000000000/"
        );
        assert_eq!(
            thumbnail_key(id),
            "videos/thumbs/00000000-0000-0000-0000-000000000000.jpg"
        );
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("master.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("480p_001.ts"), "video/mp2t");
        assert_eq!(content_type_for("thumb.jpg"), "image/jpeg");
        assert_eq!(content_type_for("unknown.bin"), "application/octet-stream");
    }
}
