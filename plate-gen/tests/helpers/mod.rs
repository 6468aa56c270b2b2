//! Shared fixtures for plate-gen integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use plate_common::events::{ProgressChannel, ProgressSnapshot, ProgressSubscription};
use plate_gen::db::{artifacts, init_tables};
use plate_gen::models::{Artifact, Section};
use plate_gen::services::{
    GeneratedImage, GenerationOrchestrator, ImageProvider, ImageRequest, ObjectStore,
    OrchestratorSettings, ProviderError, StorageError,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// In-memory database with all tables
///
/// One pooled connection: every `:memory:` connection is its own database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory database");
    init_tables(&pool).await.expect("create tables");
    pool
}

pub fn sections(headings: &[&str]) -> Vec<Section> {
    headings
        .iter()
        .enumerate()
        .map(|(i, heading)| Section::new(*heading, format!("Content of {}", heading), i as u32))
        .collect()
}

/// Store an artifact the way the document parser would
pub async fn seed_artifact(pool: &SqlitePool, title: &str, sections: Vec<Section>) -> Artifact {
    let artifact = Artifact {
        artifact_id: Uuid::new_v4(),
        title: title.to_string(),
        sections,
    };
    artifacts::save_artifact(pool, &artifact)
        .await
        .expect("save artifact");
    artifact
}

/// Settings with no inter-section wait
pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        section_delay: Duration::ZERO,
        ..OrchestratorSettings::default()
    }
}

/// Image provider that succeeds unless a call index is scripted to fail
pub struct ScriptedProvider {
    failing_calls: HashSet<usize>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            failing_calls: HashSet::new(),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the call with this zero-based index
    pub fn failing_call(mut self, index: usize) -> Self {
        self.failing_calls.insert(index);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_calls.contains(&index) {
            return Err(ProviderError::ContentPolicy(format!("call {} rejected", index)));
        }

        Ok(GeneratedImage {
            image_url: format!("https://provider.test/tmp/{}.png", index),
            revised_prompt: Some(format!("revised {}", index)),
        })
    }
}

/// Object store that records every persist call
pub struct RecordingStore {
    failing_calls: HashSet<usize>,
    calls: AtomicUsize,
    persisted: Mutex<Vec<(String, String)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            failing_calls: HashSet::new(),
            calls: AtomicUsize::new(0),
            persisted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_call(mut self, index: usize) -> Self {
        self.failing_calls.insert(index);
        self
    }

    /// `(remote_url, destination_name)` pairs in call order
    pub fn persisted(&self) -> Vec<(String, String)> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn persist(&self, remote_url: &str, destination_name: &str) -> Result<String, StorageError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.persisted
            .lock()
            .unwrap()
            .push((remote_url.to_string(), destination_name.to_string()));

        if self.failing_calls.contains(&index) {
            return Err(StorageError::Upload {
                status: 503,
                message: "bucket unavailable".to_string(),
            });
        }

        Ok(format!("https://store.test/{}", destination_name))
    }
}

pub fn orchestrator(
    pool: &SqlitePool,
    provider: Arc<ScriptedProvider>,
    store: Arc<RecordingStore>,
    settings: OrchestratorSettings,
) -> Arc<GenerationOrchestrator> {
    Arc::new(GenerationOrchestrator::new(
        pool.clone(),
        provider,
        store,
        settings,
    ))
}

/// Drain a subscription until its terminal snapshot
pub async fn collect(mut subscription: ProgressSubscription) -> Vec<ProgressSnapshot> {
    let mut snapshots = Vec::new();
    while let Some(snapshot) = subscription.recv().await {
        snapshots.push(snapshot);
    }
    snapshots
}

pub fn positions(snapshots: &[ProgressSnapshot]) -> Vec<(usize, usize, bool)> {
    snapshots
        .iter()
        .map(|s| (s.current, s.total, s.complete))
        .collect()
}

/// Wait until a channel turns terminal, bounded
pub async fn wait_terminal(channel: &ProgressChannel) -> ProgressSnapshot {
    let subscription = channel.subscribe();
    let snapshots = tokio::time::timeout(Duration::from_secs(10), collect(subscription))
        .await
        .expect("job finished in time");
    snapshots.last().cloned().expect("terminal snapshot")
}
