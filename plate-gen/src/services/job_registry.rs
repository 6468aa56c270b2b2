//! In-process registry of generation jobs
//!
//! One entry per artifact, holding the job's state, progress channel and
//! cancellation token. Entries live in process memory only; nothing survives a
//! restart and interrupted jobs are not resumed.

use chrono::{DateTime, Utc};
use plate_common::events::{ChannelState, ProgressChannel, ProgressPublisher};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{Artifact, JobOutcome, JobState};
use crate::services::GenerationOrchestrator;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Generation already running for artifact {0}")]
    AlreadyRunning(Uuid),

    #[error("No generation job for artifact {0}")]
    NotFound(Uuid),

    #[error("Generation for artifact {0} already finished")]
    AlreadyTerminal(Uuid),
}

/// Snapshot of one job's bookkeeping
#[derive(Clone)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub artifact_id: Uuid,
    pub state: JobState,
    pub total_sections: usize,
    pub channel: ProgressChannel,
    pub cancel: CancellationToken,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<JobOutcome>,
}

impl JobRecord {
    /// Terminal by bookkeeping or by channel
    ///
    /// The channel turns terminal slightly before the spawned task records the
    /// outcome, and also when the task dies without finishing.
    pub fn is_terminal(&self) -> bool {
        self.state == JobState::Terminal || self.channel.state() == ChannelState::Terminal
    }

    /// State as seen by clients
    pub fn effective_state(&self) -> JobState {
        if self.is_terminal() {
            JobState::Terminal
        } else {
            self.state
        }
    }
}

/// Registry of generation jobs keyed by artifact id
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
    channel_capacity: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(plate_common::events::DEFAULT_CHANNEL_CAPACITY)
    }
}

impl JobRegistry {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            channel_capacity,
        }
    }

    /// Register a queued job for an artifact
    ///
    /// Fails if the artifact already has a job that is not terminal. A terminal
    /// entry is replaced.
    pub async fn register(
        &self,
        artifact_id: Uuid,
        total_sections: usize,
    ) -> Result<(JobRecord, ProgressPublisher), RegistryError> {
        let mut jobs = self.jobs.write().await;

        if let Some(existing) = jobs.get(&artifact_id) {
            if !existing.is_terminal() {
                return Err(RegistryError::AlreadyRunning(artifact_id));
            }
        }

        let (channel, publisher) = ProgressChannel::new(total_sections, self.channel_capacity);
        let record = JobRecord {
            job_id: Uuid::new_v4(),
            artifact_id,
            state: JobState::Queued,
            total_sections,
            channel,
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
            ended_at: None,
            outcome: None,
        };
        jobs.insert(artifact_id, record.clone());

        tracing::debug!(artifact_id = %artifact_id, job_id = %record.job_id, "Job registered");

        Ok((record, publisher))
    }

    /// Register a job and run the orchestrator for it in the background
    ///
    /// Returns as soon as the job is registered; the caller never waits for
    /// generation.
    pub async fn start_job(
        &self,
        orchestrator: Arc<GenerationOrchestrator>,
        artifact: Artifact,
    ) -> Result<JobRecord, RegistryError> {
        let (record, publisher) = self
            .register(artifact.artifact_id, artifact.sections.len())
            .await?;

        let registry = self.clone();
        let job_id = record.job_id;
        let cancel = record.cancel.clone();

        tokio::spawn(async move {
            let artifact_id = artifact.artifact_id;
            tracing::info!(
                artifact_id = %artifact_id,
                job_id = %job_id,
                "Background generation task started"
            );

            registry.set_state(artifact_id, job_id, JobState::Running).await;

            let outcome = orchestrator
                .generate_all(artifact_id, artifact.sections, &artifact.title, publisher, cancel)
                .await;

            registry.mark_terminal(artifact_id, job_id, outcome).await;
        });

        Ok(record)
    }

    async fn set_state(&self, artifact_id: Uuid, job_id: Uuid, state: JobState) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(&artifact_id).filter(|r| r.job_id == job_id) {
            record.state = state;
        }
    }

    /// Record a finished job's outcome
    pub async fn mark_terminal(&self, artifact_id: Uuid, job_id: Uuid, outcome: JobOutcome) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(&artifact_id).filter(|r| r.job_id == job_id) {
            record.state = JobState::Terminal;
            record.ended_at = Some(Utc::now());
            record.outcome = Some(outcome);
        }
    }

    /// Current job for an artifact
    pub async fn get(&self, artifact_id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&artifact_id).cloned()
    }

    /// Request early termination of an artifact's job
    pub async fn cancel(&self, artifact_id: Uuid) -> Result<JobRecord, RegistryError> {
        let record = self
            .get(artifact_id)
            .await
            .ok_or(RegistryError::NotFound(artifact_id))?;

        if record.is_terminal() {
            return Err(RegistryError::AlreadyTerminal(artifact_id));
        }

        record.cancel.cancel();
        tracing::info!(artifact_id = %artifact_id, job_id = %record.job_id, "Generation cancellation requested");
        Ok(record)
    }

    /// Number of jobs not yet terminal
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|record| !record.is_terminal())
            .count()
    }
}
