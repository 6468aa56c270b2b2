//! Artifact and section storage
//!
//! Written by the document parser; read by the section source when a
//! generation job starts.

use plate_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Artifact, Section};

/// Insert or replace an artifact and all of its sections
pub async fn save_artifact(pool: &SqlitePool, artifact: &Artifact) -> Result<()> {
    let artifact_id = artifact.artifact_id.to_string();
    let created_at = chrono::Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO artifacts (artifact_id, title, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(artifact_id) DO UPDATE SET title = excluded.title
        "#,
    )
    .bind(&artifact_id)
    .bind(&artifact.title)
    .bind(&created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM artifact_sections WHERE artifact_id = ?")
        .bind(&artifact_id)
        .execute(&mut *tx)
        .await?;

    for section in &artifact.sections {
        sqlx::query(
            r#"
            INSERT INTO artifact_sections (artifact_id, section_order, heading, content)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&artifact_id)
        .bind(section.order as i64)
        .bind(&section.heading)
        .bind(&section.content)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        artifact_id = %artifact.artifact_id,
        sections = artifact.sections.len(),
        "Artifact saved"
    );

    Ok(())
}

/// Load an artifact with its sections in ascending order
pub async fn load_artifact(pool: &SqlitePool, artifact_id: Uuid) -> Result<Option<Artifact>> {
    let artifact_id_str = artifact_id.to_string();

    let title: Option<String> =
        sqlx::query_scalar("SELECT title FROM artifacts WHERE artifact_id = ?")
            .bind(&artifact_id_str)
            .fetch_optional(pool)
            .await?;

    let Some(title) = title else {
        return Ok(None);
    };

    let rows = sqlx::query(
        r#"
        SELECT section_order, heading, content
        FROM artifact_sections
        WHERE artifact_id = ?
        ORDER BY section_order ASC
        "#,
    )
    .bind(&artifact_id_str)
    .fetch_all(pool)
    .await?;

    let sections = rows
        .into_iter()
        .map(|row| {
            let order: i64 = row.get("section_order");
            let order = u32::try_from(order)
                .map_err(|_| Error::Internal(format!("Invalid section order: {}", order)))?;
            Ok(Section {
                heading: row.get("heading"),
                content: row.get("content"),
                order,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(Artifact {
        artifact_id,
        title,
        sections,
    }))
}
