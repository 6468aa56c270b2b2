//! Generation job API handlers
//!
//! POST /artifacts/:artifact_id/images/generate, GET .../status, POST .../cancel

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use plate_common::events::ProgressSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{validate_sections, JobOutcome, JobState},
    AppState,
};

/// POST /artifacts/:artifact_id/images/generate response
#[derive(Debug, Serialize, Deserialize)]
pub struct StartGenerationResponse {
    pub job_id: Uuid,
    pub artifact_id: Uuid,
    pub state: JobState,
    pub total_sections: usize,
    pub started_at: DateTime<Utc>,
    /// Relative URL of the SSE progress stream
    pub progress_url: String,
}

/// GET /artifacts/:artifact_id/images/status response
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationStatusResponse {
    pub job_id: Uuid,
    pub artifact_id: Uuid,
    pub state: JobState,
    pub total_sections: usize,
    /// Latest published snapshot, `None` before the first section starts
    pub progress: Option<ProgressSnapshot>,
    pub percentage: u8,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<JobOutcome>,
}

/// POST /artifacts/:artifact_id/images/cancel response
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelGenerationResponse {
    pub job_id: Uuid,
    pub artifact_id: Uuid,
    /// Always true; the job winds down asynchronously
    pub cancel_requested: bool,
    pub requested_at: DateTime<Utc>,
}

pub(crate) fn progress_url(artifact_id: Uuid) -> String {
    format!("/artifacts/{}/images/progress", artifact_id)
}

/// POST /artifacts/:artifact_id/images/generate
///
/// Starts generation in the background and returns 202 Accepted immediately.
pub async fn start_generation(
    State(state): State<AppState>,
    Path(artifact_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<StartGenerationResponse>)> {
    let artifact = state
        .artifacts
        .load_artifact(artifact_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Artifact not found: {}", artifact_id)))?;

    validate_sections(&artifact.sections).map_err(ApiError::BadRequest)?;

    let record = state
        .jobs
        .start_job(state.orchestrator.clone(), artifact)
        .await?;

    tracing::info!(
        artifact_id = %artifact_id,
        job_id = %record.job_id,
        total_sections = record.total_sections,
        "Section image generation started"
    );

    let response = StartGenerationResponse {
        job_id: record.job_id,
        artifact_id,
        state: record.state,
        total_sections: record.total_sections,
        started_at: record.started_at,
        progress_url: progress_url(artifact_id),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /artifacts/:artifact_id/images/status
pub async fn get_generation_status(
    State(state): State<AppState>,
    Path(artifact_id): Path<Uuid>,
) -> ApiResult<Json<GenerationStatusResponse>> {
    let record = state.jobs.get(artifact_id).await.ok_or_else(|| {
        ApiError::NotFound(format!("No generation job for artifact {}", artifact_id))
    })?;

    let progress = record.channel.latest();
    let percentage = progress.as_ref().map(|s| s.percentage()).unwrap_or(0);

    tracing::debug!(artifact_id = %artifact_id, state = ?record.effective_state(), "Status query");

    Ok(Json(GenerationStatusResponse {
        job_id: record.job_id,
        artifact_id,
        state: record.effective_state(),
        total_sections: record.total_sections,
        progress,
        percentage,
        started_at: record.started_at,
        ended_at: record.ended_at,
        outcome: record.outcome,
    }))
}

/// POST /artifacts/:artifact_id/images/cancel
///
/// 404 when the artifact has no job, 400 when its job already finished.
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(artifact_id): Path<Uuid>,
) -> ApiResult<Json<CancelGenerationResponse>> {
    let record = state.jobs.cancel(artifact_id).await?;

    Ok(Json(CancelGenerationResponse {
        job_id: record.job_id,
        artifact_id,
        cancel_requested: true,
        requested_at: Utc::now(),
    }))
}

/// Build generation routes
pub fn generation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/artifacts/:artifact_id/images/generate",
            post(start_generation),
        )
        .route(
            "/artifacts/:artifact_id/images/status",
            get(get_generation_status),
        )
        .route(
            "/artifacts/:artifact_id/images/cancel",
            post(cancel_generation),
        )
}
