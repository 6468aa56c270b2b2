//! SSE progress stream
//!
//! GET /artifacts/:artifact_id/images/progress streams `progress` events for the
//! artifact's current job. A subscriber joining mid-job receives snapshots
//! published from then on, with no replay. One joining after the job finished
//! receives only the terminal snapshot. The response ends after the terminal
//! snapshot.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use plate_common::sse::{create_progress_sse_stream, DisconnectHook};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    /// Cancel the job if this subscriber disconnects before it finishes
    #[serde(default)]
    pub cancel_on_disconnect: bool,
}

/// GET /artifacts/:artifact_id/images/progress
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(artifact_id): Path<Uuid>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<impl IntoResponse> {
    let record = state.jobs.get(artifact_id).await.ok_or_else(|| {
        ApiError::NotFound(format!("No generation job for artifact {}", artifact_id))
    })?;

    let subscription = record.channel.subscribe();

    let on_disconnect: Option<DisconnectHook> = if query.cancel_on_disconnect {
        let cancel = record.cancel.clone();
        let job_id = record.job_id;
        Some(Box::new(move || {
            tracing::info!(
                artifact_id = %artifact_id,
                job_id = %job_id,
                "Progress subscriber disconnected early, cancelling job"
            );
            cancel.cancel();
        }))
    } else {
        None
    };

    Ok(create_progress_sse_stream(
        artifact_id.to_string(),
        subscription,
        on_disconnect,
    ))
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new().route("/artifacts/:artifact_id/images/progress", get(progress_stream))
}
