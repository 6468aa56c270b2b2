//! Section source
//!
//! Document parsing lives outside this service. The pipeline only needs an
//! artifact's title and its ordered sections, through [`ArtifactSource`].

use async_trait::async_trait;
use plate_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::Artifact;

/// Supplies artifacts with sections in ascending order
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Load an artifact, `None` if unknown
    async fn load_artifact(&self, artifact_id: Uuid) -> Result<Option<Artifact>>;
}

/// Reads artifacts written by the document parser to `plate.db`
pub struct SqliteArtifactSource {
    db: SqlitePool,
}

impl SqliteArtifactSource {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArtifactSource for SqliteArtifactSource {
    async fn load_artifact(&self, artifact_id: Uuid) -> Result<Option<Artifact>> {
        crate::db::artifacts::load_artifact(&self.db, artifact_id).await
    }
}
