//! Configuration loading and root folder resolution
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `PLATE_CONFIG` environment variable
//! 3. `<user config dir>/plate/plate.toml`, if it exists
//! 4. Built-in defaults
//!
//! Secrets (API keys) resolve environment → TOML.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "PLATE_CONFIG";
/// Environment variable overriding the root (data) folder
pub const ENV_ROOT_FOLDER: &str = "PLATE_ROOT";
/// Environment variable holding the image provider API key
pub const ENV_PROVIDER_API_KEY: &str = "PLATE_PROVIDER_API_KEY";
/// Environment variable holding the object store API key
pub const ENV_STORAGE_API_KEY: &str = "PLATE_STORAGE_API_KEY";

/// Default listen address for plate-gen
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Contents of `plate.toml`
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Data folder holding `plate.db` and locally stored media
    pub root_folder: Option<PathBuf>,
    /// Listen address, e.g. `127.0.0.1:5740`
    pub bind_address: Option<String>,
    pub logging: LoggingConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[provider]` - external image generation API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// `1024x1024`, `1792x1024` or `1024x1792`
    pub size: String,
    /// `standard` or `hd`
    pub quality: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "dall-e-3".to_string(),
            api_key: None,
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Object store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files under `<root_folder>/media`, served by plate-gen at `/media`
    Local,
    /// Remote bucket API (`/storage/v1/object/...`)
    Http,
}

/// `[storage]` - durable image hosting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket API base URL (http backend)
    pub base_url: Option<String>,
    pub bucket: String,
    pub api_key: Option<String>,
    /// Public URL prefix for the local backend
    pub public_base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            base_url: None,
            bucket: "section-images".to_string(),
            api_key: None,
            public_base_url: None,
            timeout_secs: 60,
        }
    }
}

/// `[generation]` - orchestrator and consumer policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Fixed wait between sections (provider rate limit)
    pub section_delay_ms: u64,
    /// Characters of section content included in a prompt
    pub excerpt_chars: usize,
    /// Pause before a consumer's completion callback runs
    pub grace_period_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            section_delay_ms: 2000,
            excerpt_chars: 500,
            grace_period_ms: 1500,
        }
    }
}

impl TomlConfig {
    /// Listen address with default applied
    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolve and load configuration
///
/// An explicitly named file (CLI or environment) must exist. The per-user
/// default file is optional; without it built-in defaults are used.
pub fn load_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = cli_path {
        info!("Loading config from command-line path: {}", path.display());
        return load_toml_config(path);
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(path);
        info!("Loading config from {}: {}", ENV_CONFIG_PATH, path.display());
        return load_toml_config(&path);
    }

    if let Some(path) = default_config_path().filter(|p| p.exists()) {
        info!("Loading config from {}", path.display());
        return load_toml_config(&path);
    }

    info!("No config file found, using built-in defaults");
    Ok(TomlConfig::default())
}

/// `<user config dir>/plate/plate.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plate").join("plate.toml"))
}

/// Resolve the root folder: CLI → `PLATE_ROOT` → TOML → OS data dir
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("plate"))
        .unwrap_or_else(|| PathBuf::from("./plate_data"))
}

/// Resolve a secret from environment, then TOML
///
/// Warns when both sources carry a value; the environment wins.
pub fn resolve_secret(env_var: &str, toml_value: Option<&str>, label: &str) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_value = toml_value.filter(|k| is_valid_key(k));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment ({}).",
            label, env_var
        );
    }

    if let Some(key) = env_value {
        info!("{} loaded from environment variable", label);
        return Some(key);
    }

    if let Some(key) = toml_value {
        info!("{} loaded from TOML config", label);
        return Some(key.to_string());
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
