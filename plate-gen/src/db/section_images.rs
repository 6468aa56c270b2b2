//! Section image record persistence
//!
//! Append-only from the pipeline's point of view. "Current image per section"
//! is a query-time contract: the latest record by `created_at` wins.

use chrono::{DateTime, SecondsFormat, Utc};
use plate_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::SectionImageRecord;

const SELECT_COLUMNS: &str = r#"
    image_id, artifact_id, section_heading, section_order, image_url,
    prompt_used, revised_prompt, image_size, generation_cost, created_at
"#;

// Fixed-width timestamps so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Append a record
pub async fn insert_record(pool: &SqlitePool, record: &SectionImageRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO section_images (
            image_id, artifact_id, section_heading, section_order, image_url,
            prompt_used, revised_prompt, image_size, generation_cost, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.image_id.to_string())
    .bind(record.artifact_id.to_string())
    .bind(&record.section_heading)
    .bind(record.section_order as i64)
    .bind(&record.image_url)
    .bind(&record.prompt_used)
    .bind(&record.revised_prompt)
    .bind(&record.image_size)
    .bind(record.generation_cost)
    .bind(format_timestamp(&record.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// All records for an artifact, ordered by section order then creation time
pub async fn list_records(pool: &SqlitePool, artifact_id: Uuid) -> Result<Vec<SectionImageRecord>> {
    let sql = format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM section_images
        WHERE artifact_id = ?
        ORDER BY section_order ASC, created_at ASC, rowid ASC
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(artifact_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_record).collect()
}

/// Latest record per section, ordered by section order
pub async fn list_current_records(
    pool: &SqlitePool,
    artifact_id: Uuid,
) -> Result<Vec<SectionImageRecord>> {
    let sql = format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM section_images AS s
        WHERE s.artifact_id = ?
          AND NOT EXISTS (
              SELECT 1 FROM section_images AS n
              WHERE n.artifact_id = s.artifact_id
                AND n.section_order = s.section_order
                AND (n.created_at > s.created_at
                     OR (n.created_at = s.created_at AND n.rowid > s.rowid))
          )
        ORDER BY s.section_order ASC
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(artifact_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_record).collect()
}

/// Number of records stored for an artifact
pub async fn count_records(pool: &SqlitePool, artifact_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM section_images WHERE artifact_id = ?")
        .bind(artifact_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_record(row: &SqliteRow) -> Result<SectionImageRecord> {
    let image_id: String = row.get("image_id");
    let image_id = Uuid::parse_str(&image_id)
        .map_err(|e| Error::Internal(format!("Failed to parse image_id: {}", e)))?;

    let artifact_id: String = row.get("artifact_id");
    let artifact_id = Uuid::parse_str(&artifact_id)
        .map_err(|e| Error::Internal(format!("Failed to parse artifact_id: {}", e)))?;

    let section_order: i64 = row.get("section_order");
    let section_order = u32::try_from(section_order)
        .map_err(|_| Error::Internal(format!("Invalid section_order: {}", section_order)))?;

    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(SectionImageRecord {
        image_id,
        artifact_id,
        section_heading: row.get("section_heading"),
        section_order,
        image_url: row.get("image_url"),
        prompt_used: row.get("prompt_used"),
        revised_prompt: row.get("revised_prompt"),
        image_size: row.get("image_size"),
        generation_cost: row.get("generation_cost"),
        created_at,
    })
}
