//! Persisted section image records
//!
//! One record is written per section per successful generation. Regenerating a
//! section appends a new record; the "current" image for a section is the
//! latest by `created_at`, resolved at query time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Durable record of one generated section image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionImageRecord {
    pub image_id: Uuid,
    pub artifact_id: Uuid,
    pub section_heading: String,
    pub section_order: u32,
    /// Durable URL returned by the object store
    pub image_url: String,
    pub prompt_used: String,
    /// Prompt as rewritten by the provider, when it reports one
    pub revised_prompt: Option<String>,
    /// Provider size string, e.g. `1024x1024`
    pub image_size: String,
    /// USD
    pub generation_cost: f64,
    pub created_at: DateTime<Utc>,
}

/// Output dimensions accepted by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1792x1024",
            ImageSize::Portrait => "1024x1792",
        }
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1024x1024" => Ok(ImageSize::Square),
            "1792x1024" => Ok(ImageSize::Landscape),
            "1024x1792" => Ok(ImageSize::Portrait),
            other => Err(format!("Unsupported image size: {}", other)),
        }
    }
}

/// Provider quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Standard,
    Hd,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Standard => "standard",
            QualityTier::Hd => "hd",
        }
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(QualityTier::Standard),
            "hd" => Ok(QualityTier::Hd),
            other => Err(format!("Unsupported quality tier: {}", other)),
        }
    }
}

/// Fixed per-image cost in USD
pub fn image_cost(size: ImageSize, quality: QualityTier) -> f64 {
    match (quality, size) {
        (QualityTier::Standard, ImageSize::Square) => 0.040,
        (QualityTier::Standard, _) => 0.080,
        (QualityTier::Hd, ImageSize::Square) => 0.080,
        (QualityTier::Hd, _) => 0.120,
    }
}
