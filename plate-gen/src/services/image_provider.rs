//! Image generation provider client
//!
//! One call per prompt, no retry. Callers that want resilience wrap the
//! provider themselves.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{ImageSize, QualityTier};

const USER_AGENT: &str = concat!("plate-gen/", env!("CARGO_PKG_VERSION"));
const GENERATIONS_PATH: &str = "/v1/images/generations";

/// Image provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Prompt rejected by content policy: {0}")]
    ContentPolicy(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// One generation request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: ImageSize,
    pub quality: QualityTier,
}

/// Provider result: a short-lived URL to the generated image
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Temporary URL, must be re-hosted promptly
    pub image_url: String,
    pub revised_prompt: Option<String>,
}

/// Capability: turn a prompt into an image
///
/// Implementations must be safe for concurrent use by independent jobs.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Generate one image
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError>;
}

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    quality: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Vec<GenerationData>,
}

#[derive(Debug, Deserialize)]
struct GenerationData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    code: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Client for an OpenAI-compatible `/v1/images/generations` endpoint
pub struct OpenAiImageProvider {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiImageProvider {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), GENERATIONS_PATH),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let body = GenerationBody {
            model: &self.model,
            prompt: &request.prompt,
            n: 1,
            size: request.size.as_str(),
            quality: request.quality.as_str(),
        };

        tracing::debug!(
            model = %self.model,
            size = request.size.as_str(),
            quality = request.quality.as_str(),
            prompt_chars = request.prompt.chars().count(),
            "Requesting image generation"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_error_response(status.as_u16(), &error_text));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("response contained no images".to_string()))?;

        let image_url = first
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("image entry has no url".to_string()))?;

        Ok(GeneratedImage {
            image_url,
            revised_prompt: first.revised_prompt,
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Classify a non-success provider response
fn map_error_response(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .unwrap_or_default();

    let message = detail
        .message
        .clone()
        .unwrap_or_else(|| body.trim().to_string());
    let code = detail.code.as_deref().or(detail.kind.as_deref()).unwrap_or("");

    match status {
        429 if code == "insufficient_quota" => ProviderError::QuotaExceeded(message),
        429 => ProviderError::RateLimited(message),
        400 if code == "content_policy_violation" => ProviderError::ContentPolicy(message),
        408 | 504 => ProviderError::Timeout,
        _ => ProviderError::Api { status, message },
    }
}
