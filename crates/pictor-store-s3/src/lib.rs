//! S3/MinIO implementation of the pictor BlobStore trait
//!
//! Blobs are stored under `<key_prefix>/<name>` in a single bucket.
//! Uploads run on a spawned task and report progress through a watch
//! channel; payloads above the part size go through the S3 multipart
//! protocol so a failed part aborts the upload server-side.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pictor_store_s3::{S3BlobConfig, S3BlobStore};
//!
//! # async fn example() -> pictor_store::Result<()> {
//! let config = S3BlobConfig {
//!     region: "us-east-1".to_string(),
//!     endpoint: Some("http://localhost:9000".to_string()),
//!     bucket: "pictor".to_string(),
//!     access_key: "access_key".to_string(),
//!     secret_key: "secret_key".to_string(),
//!     key_prefix: "images".to_string(),
//!     url_expiry_secs: 3600,
//! };
//! let blobs = S3BlobStore::connect(config).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Region, SharedCredentialsProvider};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use pictor_store::{
    BlobInfo, BlobStore, ByteStream, Result, StoreError, UploadProgress, UploadTask,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

/// Default key prefix for image blobs
pub const DEFAULT_KEY_PREFIX: &str = "images";
/// Default presigned URL lifetime
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;

/// S3 multipart part size; payloads at or below this go up in one PUT
const PART_SIZE: usize = 5 * 1024 * 1024;

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_url_expiry_secs() -> u64 {
    DEFAULT_URL_EXPIRY_SECS
}

/// Configuration for the S3 blob store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BlobConfig {
    /// AWS region (e.g., "us-east-1")
    pub region: String,
    /// Custom endpoint for MinIO/S3-compatible storage
    pub endpoint: Option<String>,
    /// Bucket holding the blobs
    pub bucket: String,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
    /// Prefix prepended to every object key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Lifetime of presigned download URLs in seconds
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,
}

/// S3/MinIO blob store implementation
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    key_prefix: String,
    url_expiry: Duration,
}

impl S3BlobStore {
    /// Build the S3 client from static credentials and connect
    pub async fn connect(config: S3BlobConfig) -> Result<Self> {
        debug!("Creating S3 blob store for region: {}", config.region);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "pictor-store-s3",
        );
        let creds_provider = SharedCredentialsProvider::new(credentials);

        let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()));

        let mut config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .credentials_provider(creds_provider);

        // Custom endpoint for MinIO/S3-compatible storage
        if let Some(ref endpoint) = config.endpoint {
            config_builder = config_builder.endpoint_url(endpoint);
        }

        let sdk_config = config_builder.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        // Path-style addressing for MinIO compatibility
        if config.endpoint.is_some() {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        debug!("S3 client created successfully");

        Ok(Self {
            client,
            bucket: config.bucket,
            key_prefix: config.key_prefix,
            url_expiry: Duration::from_secs(config.url_expiry_secs),
        })
    }

    fn key(&self, name: &str) -> String {
        object_key(&self.key_prefix, name)
    }
}

/// Build the object key from the configured prefix and a blob name
fn object_key(prefix: &str, name: &str) -> String {
    let normalized = name.trim_start_matches('/');
    format!("{}/{}", prefix.trim_end_matches('/'), normalized)
}

/// Guess content type from a filename extension
fn guess_content_type(name: &str) -> String {
    let extension = name.rsplit('.').next().unwrap_or("").to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn is_missing_object(message: &str) -> bool {
    message.contains("NoSuchKey") || message.contains("NotFound") || message.contains("404")
}

async fn abort_upload(client: &Client, bucket: &str, key: &str, upload_id: &str) {
    if let Err(e) = client
        .abort_multipart_upload()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .send()
        .await
    {
        debug!("Failed to abort multipart upload for {}: {}", key, e);
    }
}

async fn run_upload(
    client: Client,
    bucket: String,
    key: String,
    name: String,
    content_type: String,
    data: Bytes,
    progress: watch::Sender<UploadProgress>,
) -> Result<BlobInfo> {
    let total = data.len();

    if total <= PART_SIZE {
        debug!("PUT {} ({} bytes, {})", key, total, content_type);

        client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(S3ByteStream::from(data))
            .content_type(&content_type)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload {}: {}", key, e);
                StoreError::UploadFailed(e.to_string())
            })?;

        progress.send_replace(UploadProgress {
            bytes_transferred: total as u64,
            total_bytes: total as u64,
        });
    } else {
        debug!(
            "MULTIPART PUT {} ({} bytes, {} byte parts)",
            key, total, PART_SIZE
        );

        let created = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key(&key)
            .content_type(&content_type)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to create multipart upload for {}: {}", key, e);
                StoreError::UploadFailed(e.to_string())
            })?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StoreError::UploadFailed("No upload ID received".to_string()))?
            .to_string();

        let mut parts = CompletedMultipartUpload::builder();
        let mut transferred = 0usize;
        let mut part_number = 1i32;
        let mut offset = 0usize;

        while offset < total {
            let end = usize::min(offset + PART_SIZE, total);
            let chunk = data.slice(offset..end);
            let chunk_len = chunk.len();

            let uploaded = match client
                .upload_part()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(S3ByteStream::from(chunk))
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Failed to upload part {} of {}: {}", part_number, key, e);
                    abort_upload(&client, &bucket, &key, &upload_id).await;
                    return Err(StoreError::UploadFailed(e.to_string()));
                }
            };

            parts = parts.parts(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(|t| t.to_string()))
                    .part_number(part_number)
                    .build(),
            );

            transferred += chunk_len;
            part_number += 1;
            offset = end;

            progress.send_replace(UploadProgress {
                bytes_transferred: transferred as u64,
                total_bytes: total as u64,
            });
        }

        if let Err(e) = client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key(&key)
            .upload_id(&upload_id)
            .multipart_upload(parts.build())
            .send()
            .await
        {
            error!("Failed to complete multipart upload for {}: {}", key, e);
            abort_upload(&client, &bucket, &key, &upload_id).await;
            return Err(StoreError::UploadFailed(e.to_string()));
        }
    }

    debug!("Uploaded {} ({} bytes)", key, total);

    Ok(BlobInfo {
        pathname: name,
        key,
        content_type,
        size: total as i64,
        uploaded_at: Utc::now(),
    })
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, name: &str, data: Bytes) -> Result<UploadTask> {
        let key = self.key(name);
        let content_type = guess_content_type(name);
        let total = data.len() as u64;

        let (tx, rx) = watch::channel(UploadProgress::starting(total));

        let handle = tokio::spawn(run_upload(
            self.client.clone(),
            self.bucket.clone(),
            key,
            name.to_string(),
            content_type,
            data,
            tx,
        ));

        Ok(UploadTask::new(rx, handle))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let key = self.key(name);
        debug!("DELETE {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete {}: {}", key, e);
                StoreError::Backend(e.to_string())
            })?;

        Ok(())
    }

    async fn download_url(&self, name: &str) -> Result<String> {
        let key = self.key(name);
        debug!("PRESIGN GET {}", key);

        let presigning = PresigningConfig::expires_in(self.url_expiry)
            .map_err(|e| StoreError::InvalidConfiguration(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                error!("Failed to presign {}: {}", key, e);
                StoreError::Backend(e.to_string())
            })?;

        Ok(request.uri().to_string())
    }

    async fn download(&self, name: &str) -> Result<(ByteStream, Option<String>)> {
        let key = self.key(name);
        debug!("GET {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if is_missing_object(&message) {
                    StoreError::NotFound(name.to_string())
                } else {
                    error!("Failed to download {}: {}", key, message);
                    StoreError::Backend(message)
                }
            })?;

        let content_type = response.content_type().map(|s| s.to_string());

        // ByteStream -> AsyncRead -> ReaderStream
        let reader = tokio_util::io::ReaderStream::new(response.body.into_async_read());

        Ok((Box::new(reader), content_type))
    }

    async fn head(&self, name: &str) -> Result<BlobInfo> {
        let key = self.key(name);
        debug!("HEAD {}", key);

        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if is_missing_object(&message) {
                    StoreError::NotFound(name.to_string())
                } else {
                    error!("Failed to stat {}: {}", key, message);
                    StoreError::Backend(message)
                }
            })?;

        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let uploaded_at = response
            .last_modified()
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos()))
            .unwrap_or_else(Utc::now);

        Ok(BlobInfo {
            pathname: name.to_string(),
            key,
            content_type,
            size: response.content_length().unwrap_or(0),
            uploaded_at,
        })
    }
}
