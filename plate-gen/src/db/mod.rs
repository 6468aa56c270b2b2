//! Database access for plate-gen
//!
//! SQLite database `plate.db` in the root folder. The pipeline only appends to
//! `section_images`; `artifacts` and `artifact_sections` are written by the
//! document parser.

pub mod artifacts;
pub mod section_images;

use plate_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "plate.db";

/// Initialize database connection pool
///
/// Creates the file if missing and ensures all tables exist.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create plate-gen tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            artifact_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifact_sections (
            artifact_id TEXT NOT NULL REFERENCES artifacts(artifact_id) ON DELETE CASCADE,
            section_order INTEGER NOT NULL,
            heading TEXT NOT NULL,
            content TEXT NOT NULL,
            PRIMARY KEY (artifact_id, section_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // No uniqueness on (artifact_id, section_order): regenerations append and
    // the latest row per section is selected at query time.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS section_images (
            image_id TEXT PRIMARY KEY,
            artifact_id TEXT NOT NULL,
            section_heading TEXT NOT NULL,
            section_order INTEGER NOT NULL,
            image_url TEXT NOT NULL,
            prompt_used TEXT NOT NULL,
            revised_prompt TEXT,
            image_size TEXT NOT NULL,
            generation_cost REAL NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_section_images_artifact
            ON section_images (artifact_id, section_order, created_at)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (artifacts, artifact_sections, section_images)");

    Ok(())
}

/// Single-connection in-memory database for unit tests
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    pool
}
