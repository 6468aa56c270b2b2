//! plate-gen library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::services::{ArtifactSource, GenerationOrchestrator, JobRegistry, SqliteArtifactSource};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Active and most recent generation job per artifact
    pub jobs: JobRegistry,
    /// Shared orchestrator; jobs keep their state on their own task
    pub orchestrator: Arc<GenerationOrchestrator>,
    /// Where artifacts and their sections are read from
    pub artifacts: Arc<dyn ArtifactSource>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Served at `/media` when the local object store is in use
    pub media_root: Option<PathBuf>,
}

impl AppState {
    /// State reading artifacts from the same database it writes images to
    pub fn new(db: SqlitePool, orchestrator: Arc<GenerationOrchestrator>) -> Self {
        let artifacts = Arc::new(SqliteArtifactSource::new(db.clone()));
        Self {
            db,
            jobs: JobRegistry::default(),
            orchestrator,
            artifacts,
            startup_time: Utc::now(),
            media_root: None,
        }
    }

    pub fn with_artifact_source(mut self, artifacts: Arc<dyn ArtifactSource>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_media_root(mut self, media_root: Option<PathBuf>) -> Self {
        self.media_root = media_root;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let media_root = state.media_root.clone();

    let router = Router::new()
        .merge(api::generation_routes())
        .merge(api::progress_routes())
        .merge(api::image_routes())
        .merge(api::health_routes())
        .with_state(state);

    match media_root {
        Some(root) => router.nest_service("/media", ServeDir::new(root)),
        None => router,
    }
}
