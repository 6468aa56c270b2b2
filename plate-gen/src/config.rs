//! Service wiring for plate-gen
//!
//! Turns a loaded [`TomlConfig`] into the concrete image provider, object
//! store and orchestrator policy. Secrets resolve environment → TOML.

use plate_common::config::{
    resolve_secret, StorageBackend, TomlConfig, ENV_PROVIDER_API_KEY, ENV_STORAGE_API_KEY,
};
use plate_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::models::{ImageSize, QualityTier};
use crate::services::{
    HttpObjectStore, ImageProvider, LocalObjectStore, ObjectStore, OpenAiImageProvider,
    OrchestratorSettings,
};

/// Media subfolder of the root folder used by the local store
pub const MEDIA_DIR: &str = "media";

/// Object store chosen by configuration
pub struct ConfiguredStore {
    pub store: Arc<dyn ObjectStore>,
    /// Folder to serve at `/media`, set for the local backend only
    pub media_root: Option<PathBuf>,
}

/// Resolve the provider API key
///
/// A missing key is a startup error: no section could ever be generated.
pub fn resolve_provider_api_key(config: &TomlConfig) -> Result<String> {
    resolve_secret(
        ENV_PROVIDER_API_KEY,
        config.provider.api_key.as_deref(),
        "Image provider API key",
    )
    .ok_or_else(|| {
        Error::Config(format!(
            "Image provider API key not configured. Set {} or [provider] api_key in plate.toml",
            ENV_PROVIDER_API_KEY
        ))
    })
}

/// Build the image provider client
pub fn build_image_provider(config: &TomlConfig) -> Result<Arc<dyn ImageProvider>> {
    let api_key = resolve_provider_api_key(config)?;
    let provider = OpenAiImageProvider::new(
        &config.provider.base_url,
        config.provider.model.clone(),
        api_key,
        Duration::from_secs(config.provider.timeout_secs),
    )
    .map_err(|e| Error::Config(format!("Image provider client: {}", e)))?;

    info!(
        base_url = %config.provider.base_url,
        model = %config.provider.model,
        "Image provider configured"
    );

    Ok(Arc::new(provider))
}

/// Build the object store for the configured backend
pub fn build_object_store(config: &TomlConfig, root_folder: &Path) -> Result<ConfiguredStore> {
    let storage = &config.storage;
    let timeout = Duration::from_secs(storage.timeout_secs);

    match storage.backend {
        StorageBackend::Http => {
            let base_url = storage.base_url.as_deref().ok_or_else(|| {
                Error::Config("[storage] base_url is required for the http backend".to_string())
            })?;
            let api_key = resolve_secret(
                ENV_STORAGE_API_KEY,
                storage.api_key.as_deref(),
                "Object store API key",
            )
            .ok_or_else(|| {
                Error::Config(format!(
                    "Object store API key not configured. Set {} or [storage] api_key in plate.toml",
                    ENV_STORAGE_API_KEY
                ))
            })?;

            let store = HttpObjectStore::new(base_url, storage.bucket.clone(), api_key, timeout)
                .map_err(|e| Error::Config(format!("Object store client: {}", e)))?;

            info!(base_url = %base_url, bucket = %storage.bucket, "Using http object store");
            Ok(ConfiguredStore {
                store: Arc::new(store),
                media_root: None,
            })
        }
        StorageBackend::Local => {
            let media_root = root_folder.join(MEDIA_DIR);
            std::fs::create_dir_all(&media_root)?;

            let public_base_url = storage
                .public_base_url
                .clone()
                .unwrap_or_else(|| format!("http://{}", config.bind_address()));

            let store = LocalObjectStore::new(media_root.clone(), &public_base_url, timeout)
                .map_err(|e| Error::Config(format!("Object store client: {}", e)))?;

            info!(
                media_root = %media_root.display(),
                public_base_url = %public_base_url,
                "Using local object store"
            );
            Ok(ConfiguredStore {
                store: Arc::new(store),
                media_root: Some(media_root),
            })
        }
    }
}

/// Orchestrator policy from `[provider]` and `[generation]`
pub fn orchestrator_settings(config: &TomlConfig) -> Result<OrchestratorSettings> {
    let size: ImageSize = config.provider.size.parse().map_err(Error::Config)?;
    let quality: QualityTier = config.provider.quality.parse().map_err(Error::Config)?;

    Ok(OrchestratorSettings {
        section_delay: Duration::from_millis(config.generation.section_delay_ms),
        excerpt_chars: config.generation.excerpt_chars,
        size,
        quality,
    })
}
