//! Object store client
//!
//! Re-hosts the provider's short-lived image URL at a durable location. The
//! temporary URL is fetched once, immediately; a failed fetch is not retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const USER_AGENT: &str = concat!("plate-gen/", env!("CARGO_PKG_VERSION"));
const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Object store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to fetch source image: {0}")]
    Fetch(String),

    #[error("Upload failed with status {status}: {message}")]
    Upload { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid destination name: {0}")]
    InvalidName(String),
}

/// Capability: persist a remote image and return its durable public URL
///
/// Implementations must be safe for concurrent use by independent jobs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Fetch `remote_url` and store it under `destination_name`
    async fn persist(&self, remote_url: &str, destination_name: &str) -> Result<String, StorageError>;
}

/// Destination name for a section image: `<artifact>/section-<order>-<millis>.png`
pub fn destination_name(artifact_id: Uuid, section_order: u32, at: DateTime<Utc>) -> String {
    format!(
        "{}/section-{}-{}.png",
        artifact_id,
        section_order,
        at.timestamp_millis()
    )
}

struct FetchedImage {
    bytes: Vec<u8>,
    content_type: String,
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, StorageError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| StorageError::Network(e.to_string()))
}

async fn fetch_remote(client: &reqwest::Client, url: &str) -> Result<FetchedImage, StorageError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| StorageError::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(StorageError::Fetch(format!("HTTP {} from {}", status.as_u16(), url)));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| StorageError::Fetch(e.to_string()))?
        .to_vec();

    if bytes.is_empty() {
        return Err(StorageError::Fetch(format!("empty body from {}", url)));
    }

    tracing::debug!(bytes = bytes.len(), content_type = %content_type, "Fetched provider image");

    Ok(FetchedImage { bytes, content_type })
}

/// Reject names that could escape the bucket or media folder
fn validate_name(name: &str) -> Result<(), StorageError> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if safe {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

/// Bucket API store (`/storage/v1/object/{bucket}/{name}`)
pub struct HttpObjectStore {
    http_client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpObjectStore {
    pub fn new(
        base_url: &str,
        bucket: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            api_key: api_key.into(),
        })
    }

    fn upload_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, name)
    }

    /// Public URL for a stored object
    pub fn public_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, name)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn persist(&self, remote_url: &str, destination_name: &str) -> Result<String, StorageError> {
        validate_name(destination_name)?;
        let image = fetch_remote(&self.http_client, remote_url).await?;

        let response = self
            .http_client
            .post(self.upload_url(destination_name))
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, image.content_type)
            .header("x-upsert", "true")
            .body(image.bytes)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                status: status.as_u16(),
                message,
            });
        }

        let url = self.public_url(destination_name);
        tracing::info!(bucket = %self.bucket, url = %url, "Image uploaded to object store");
        Ok(url)
    }
}

/// Filesystem store under `<root>/media`, served by plate-gen at `/media`
pub struct LocalObjectStore {
    http_client: reqwest::Client,
    media_root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(
        media_root: impl Into<PathBuf>,
        public_base_url: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            media_root: media_root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn persist(&self, remote_url: &str, destination_name: &str) -> Result<String, StorageError> {
        validate_name(destination_name)?;
        let image = fetch_remote(&self.http_client, remote_url).await?;

        let path = self.media_root.join(destination_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &image.bytes).await?;

        let url = format!("{}/media/{}", self.public_base_url, destination_name);
        tracing::info!(path = %path.display(), url = %url, "Image stored locally");
        Ok(url)
    }
}
