//! Section image generation orchestrator
//!
//! Walks an artifact's sections strictly in ascending `order`, one at a time:
//!
//! ```text
//! for each section:
//!     publish snapshot (current = index)
//!     prompt → ImageProvider::generate → ObjectStore::persist → insert record
//!     wait the fixed inter-section delay (not after the last section)
//! publish terminal snapshot (current = total, complete = true)
//! ```
//!
//! # Failure policy
//! A provider, storage or database failure for one section is logged and the
//! loop moves on. No record is written for that section. The job always ends
//! with a terminal snapshot, even when every section failed.
//!
//! # Cancellation
//! The job's `CancellationToken` is raced against the provider call, the
//! upload, and the inter-section delay. A cancelled job writes nothing for the
//! in-flight section and ends with a `cancelled` terminal snapshot.

use chrono::Utc;
use plate_common::events::{GenerationStage, ProgressPublisher};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::section_images;
use crate::models::{image_cost, ImageSize, JobOutcome, QualityTier, Section, SectionImageRecord};
use crate::services::image_provider::{ImageProvider, ImageRequest, ProviderError};
use crate::services::object_store::{destination_name, ObjectStore, StorageError};
use crate::services::prompt::build_prompt;

/// Default wait between sections
pub const DEFAULT_SECTION_DELAY: Duration = Duration::from_millis(2000);
/// Default number of content characters embedded in a prompt
pub const DEFAULT_EXCERPT_CHARS: usize = 500;

/// Orchestrator policy
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Fixed pause between sections to stay under the provider's rate limit
    pub section_delay: Duration,
    pub excerpt_chars: usize,
    pub size: ImageSize,
    pub quality: QualityTier,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            section_delay: DEFAULT_SECTION_DELAY,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            size: ImageSize::Square,
            quality: QualityTier::Standard,
        }
    }
}

/// Why a single section produced no record
#[derive(Debug, Error)]
enum SectionError {
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("database: {0}")]
    Database(#[from] plate_common::Error),

    #[error("cancelled")]
    Cancelled,
}

/// Generation orchestrator service
///
/// Holds shared clients only; every job's state lives on its own stack, so one
/// orchestrator serves concurrent jobs for different artifacts.
pub struct GenerationOrchestrator {
    db: SqlitePool,
    provider: Arc<dyn ImageProvider>,
    store: Arc<dyn ObjectStore>,
    settings: OrchestratorSettings,
}

impl GenerationOrchestrator {
    /// Create new orchestrator
    ///
    /// # Arguments
    /// * `db` - Pool receiving section image records
    /// * `provider` - Image generation capability
    /// * `store` - Durable image hosting capability
    /// * `settings` - Delay, excerpt length, size and quality policy
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn ImageProvider>,
        store: Arc<dyn ObjectStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            db,
            provider,
            store,
            settings,
        }
    }

    /// Generate one image per section of an artifact
    ///
    /// Side effects are the persisted records and the snapshots published on
    /// `publisher`. The returned [`JobOutcome`] is informational.
    pub async fn generate_all(
        &self,
        artifact_id: Uuid,
        mut sections: Vec<Section>,
        patent_title: &str,
        mut publisher: ProgressPublisher,
        cancel: CancellationToken,
    ) -> JobOutcome {
        sections.sort_by_key(|section| section.order);
        let total = sections.len();

        if publisher.total() != total {
            tracing::warn!(
                artifact_id = %artifact_id,
                channel_total = publisher.total(),
                sections = total,
                "Progress channel total does not match section count"
            );
        }

        tracing::info!(
            artifact_id = %artifact_id,
            total,
            provider = self.provider.name(),
            store = self.store.name(),
            "Starting section image generation"
        );

        let mut outcome = JobOutcome::default();

        for (index, section) in sections.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            publisher.step(
                index,
                GenerationStage::Generating,
                format!(
                    "Generating image {} of {}: {}",
                    index + 1,
                    total,
                    section.heading
                ),
            );
            outcome.attempted += 1;

            match self
                .generate_section(artifact_id, section, patent_title, &cancel)
                .await
            {
                Ok(record) => {
                    outcome.succeeded += 1;
                    tracing::info!(
                        artifact_id = %artifact_id,
                        section_order = section.order,
                        image_url = %record.image_url,
                        "Section image created"
                    );
                }
                Err(SectionError::Cancelled) => {
                    outcome.cancelled = true;
                    break;
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        artifact_id = %artifact_id,
                        section_order = section.order,
                        heading = %section.heading,
                        error = %e,
                        "Section image generation failed, continuing with next section"
                    );
                }
            }

            if index + 1 < total {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        outcome.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.settings.section_delay) => {}
                }
            }
        }

        let terminal = if outcome.cancelled {
            publisher.finish(
                GenerationStage::Cancelled,
                format!(
                    "Generation cancelled after {} of {} sections ({} images created)",
                    outcome.attempted, total, outcome.succeeded
                ),
            )
        } else {
            publisher.finish(
                GenerationStage::Complete,
                format!("Generated {} of {} section images", outcome.succeeded, total),
            )
        };

        tracing::info!(
            artifact_id = %artifact_id,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            stage = %terminal.stage,
            "Section image generation finished"
        );

        outcome
    }

    async fn generate_section(
        &self,
        artifact_id: Uuid,
        section: &Section,
        patent_title: &str,
        cancel: &CancellationToken,
    ) -> Result<SectionImageRecord, SectionError> {
        let prompt = build_prompt(
            patent_title,
            &section.heading,
            &section.content,
            self.settings.excerpt_chars,
        );
        let request = ImageRequest {
            prompt,
            size: self.settings.size,
            quality: self.settings.quality,
        };

        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SectionError::Cancelled),
            result = self.provider.generate(&request) => result?,
        };

        let created_at = Utc::now();
        let name = destination_name(artifact_id, section.order, created_at);

        let image_url = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SectionError::Cancelled),
            result = self.store.persist(&generated.image_url, &name) => result?,
        };

        let record = SectionImageRecord {
            image_id: Uuid::new_v4(),
            artifact_id,
            section_heading: section.heading.clone(),
            section_order: section.order,
            image_url,
            prompt_used: request.prompt,
            revised_prompt: generated.revised_prompt,
            image_size: self.settings.size.as_str().to_string(),
            generation_cost: image_cost(self.settings.size, self.settings.quality),
            created_at,
        };

        section_images::insert_record(&self.db, &record).await?;

        Ok(record)
    }
}
