//! Section image listing
//!
//! GET /artifacts/:artifact_id/images[?current=true]

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{db::section_images, error::ApiResult, models::SectionImageRecord, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ImagesQuery {
    /// Only the latest record per section
    #[serde(default)]
    pub current: bool,
}

/// GET /artifacts/:artifact_id/images response
#[derive(Debug, Serialize, Deserialize)]
pub struct SectionImagesResponse {
    pub artifact_id: Uuid,
    pub images: Vec<SectionImageRecord>,
    /// Sum of `generation_cost` over the returned records, USD
    pub total_cost: f64,
}

/// GET /artifacts/:artifact_id/images
///
/// An artifact with no records returns an empty list, not 404.
pub async fn list_section_images(
    State(state): State<AppState>,
    Path(artifact_id): Path<Uuid>,
    Query(query): Query<ImagesQuery>,
) -> ApiResult<Json<SectionImagesResponse>> {
    let images = if query.current {
        section_images::list_current_records(&state.db, artifact_id).await?
    } else {
        section_images::list_records(&state.db, artifact_id).await?
    };

    let total_cost = images.iter().fold(0.0, |sum, r| sum + r.generation_cost);

    Ok(Json(SectionImagesResponse {
        artifact_id,
        images,
        total_cost,
    }))
}

/// Build image listing routes
pub fn image_routes() -> Router<AppState> {
    Router::new().route("/artifacts/:artifact_id/images", get(list_section_images))
}
