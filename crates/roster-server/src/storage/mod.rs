//! Object storage
//!
//! [`ObjectStore`] covers the three object operations the pipeline needs:
//! reading an uploaded roster, writing an export, and issuing a time-limited
//! signed link. [`S3Storage`] implements it for any S3-compatible endpoint.

use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::{ProvideErrorMetadata, SdkError},
    operation::get_object::GetObjectError,
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client,
};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{SyncError, SyncResult};

pub mod config;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes.
    ///
    /// Fails with [`SyncError::ObjectNotFound`], [`SyncError::AccessDenied`]
    /// or [`SyncError::Backend`].
    async fn read(&self, bucket: &str, key: &str) -> SyncResult<Vec<u8>>;

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> SyncResult<()>;

    /// Signed GET URL valid for `expires_in`.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
        -> SyncResult<String>;
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub async fn new(config: config::StorageConfig) -> anyhow::Result<Self> {
        debug!(
            endpoint = ?config.endpoint,
            region = %config.region,
            path_style = config.path_style,
            "Initializing storage client"
        );

        let mut builder = match config.static_credentials() {
            Some((access_key, secret_key)) => aws_sdk_s3::Config::builder()
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "roster-storage",
                ))
                .region(Region::new(config.region.clone())),
            None => {
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!(region = %config.region, "Storage client initialized");

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    #[instrument(skip(self))]
    async fn read(&self, bucket: &str, key: &str) -> SyncResult<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify_get_error(bucket, key, err))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);
        Ok(data)
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn write(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> SyncResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", bucket, key))?;

        info!("Successfully uploaded to s3://{}/{}", bucket, key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> SyncResult<String> {
        let presigning_config =
            PresigningConfig::expires_in(expires_in).context("Failed to create presigning config")?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .context("Failed to generate presigned URL")?;

        Ok(presigned_request.uri().to_string())
    }
}

fn classify_get_error(bucket: &str, key: &str, err: SdkError<GetObjectError>) -> SyncError {
    if let SdkError::ServiceError(ref service) = err {
        let inner = service.err();
        if inner.is_no_such_key() {
            return SyncError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
        }
        if inner.code() == Some("AccessDenied") {
            return SyncError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
        }
    }

    SyncError::Backend(
        anyhow::Error::new(err).context(format!("Failed to download s3://{}/{}", bucket, key)),
    )
}

#[cfg(test)]
mod tests {
    use super::config::StorageConfig;
    use super::*;

    #[tokio::test]
    async fn test_presign_get_carries_expiry() {
        let storage = S3Storage::new(StorageConfig::for_minio("http://localhost:9000"))
            .await
            .unwrap();

        let url = storage
            .presign_get("hosting", "index.html", Duration::from_secs(2 * 60 * 60))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/hosting/index.html?"));
        assert!(url.contains("X-Amz-Expires=7200"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_presign_rejects_overlong_expiry() {
        let storage = S3Storage::new(StorageConfig::for_minio("http://localhost:9000"))
            .await
            .unwrap();

        // SigV4 links cannot outlive one week
        let result = storage
            .presign_get("hosting", "index.html", Duration::from_secs(8 * 24 * 60 * 60))
            .await;
        assert!(matches!(result, Err(SyncError::Backend(_))));
    }
}
