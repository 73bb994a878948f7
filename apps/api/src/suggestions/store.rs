use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::profile::{InlineSuggestionRow, ResumeProfileRow};
use crate::suggestions::models::InlineSuggestion;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileVersion {
    pub version: i32,
    pub s3_key: String,
}

pub fn snapshot_key(resume_id: Uuid, version: i32) -> String {
    format!("profiles/{}/v{}.json", resume_id, version)
}

/// Returns the highest version of a resume profile, if any exists.
pub async fn get_current_profile(
    pool: &PgPool,
    resume_id: Uuid,
) -> Result<Option<ResumeProfileRow>> {
    Ok(sqlx::query_as::<_, ResumeProfileRow>(
        r#"
        SELECT * FROM resume_profiles
        WHERE resume_id = $1
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(resume_id)
    .fetch_optional(pool)
    .await?)
}

/// Saves `data` as version `base_version + 1` and uploads its JSON snapshot.
/// CRITICAL: This is append-only. Never UPDATE existing rows.
///
/// Returns `None` when another writer already created that version; the caller's
/// edits were computed from a stale profile and must not be saved. Run inside a
/// transaction so a failed upload rolls the row back.
pub async fn save_profile_version(
    conn: &mut PgConnection,
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    resume_id: Uuid,
    base_version: i32,
    data: &Value,
) -> Result<Option<ProfileVersion>> {
    let new_version = base_version + 1;
    let s3_key = snapshot_key(resume_id, new_version);

    let inserted = sqlx::query(
        "INSERT INTO resume_profiles (resume_id, version, data, s3_key) VALUES ($1, $2, $3, $4)",
    )
    .bind(resume_id)
    .bind(new_version)
    .bind(data)
    .bind(&s3_key)
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            warn!("Resume {resume_id} version {new_version} already exists");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    info!("Inserted profile for resume {resume_id} version {new_version}");

    let body = serde_json::to_vec_pretty(data).context("Failed to serialize profile snapshot")?;
    s3.put_object()
        .bucket(s3_bucket)
        .key(&s3_key)
        .body(ByteStream::from(body))
        .content_type("application/json")
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

    info!("Uploaded profile snapshot to s3://{}/{}", s3_bucket, s3_key);

    Ok(Some(ProfileVersion {
        version: new_version,
        s3_key,
    }))
}

pub async fn insert_suggestions(
    pool: &PgPool,
    resume_id: Uuid,
    suggestions: &[InlineSuggestion],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    for s in suggestions {
        sqlx::query(
            r#"
            INSERT INTO inline_suggestions (id, resume_id, status, data, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&s.id)
        .bind(resume_id)
        .bind(s.status.as_str())
        .bind(serde_json::to_value(s)?)
        .bind(s.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("Stored {} suggestion(s) for resume {resume_id}", suggestions.len());
    Ok(())
}

pub async fn get_suggestion(
    pool: &PgPool,
    resume_id: Uuid,
    suggestion_id: &str,
) -> Result<Option<InlineSuggestion>> {
    let row: Option<InlineSuggestionRow> =
        sqlx::query_as("SELECT * FROM inline_suggestions WHERE id = $1 AND resume_id = $2")
            .bind(suggestion_id)
            .bind(resume_id)
            .fetch_optional(pool)
            .await?;
    row.map(InlineSuggestionRow::into_suggestion).transpose()
}

/// Pending suggestions for a resume, oldest first.
pub async fn list_pending_suggestions(
    pool: &PgPool,
    resume_id: Uuid,
) -> Result<Vec<InlineSuggestion>> {
    let rows: Vec<InlineSuggestionRow> = sqlx::query_as(
        r#"
        SELECT * FROM inline_suggestions
        WHERE resume_id = $1 AND status = 'pending'
        ORDER BY created_at, id
        "#,
    )
    .bind(resume_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(InlineSuggestionRow::into_suggestion).collect()
}

/// Moves a pending suggestion to its terminal status.
///
/// Returns `false` when the row was no longer pending, i.e. another request
/// resolved it first.
pub async fn record_resolution(
    conn: &mut PgConnection,
    suggestion: &InlineSuggestion,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE inline_suggestions
        SET status = $1, data = $2, applied_at = $3
        WHERE id = $4 AND status = 'pending'
        "#,
    )
    .bind(suggestion.status.as_str())
    .bind(serde_json::to_value(suggestion)?)
    .bind(suggestion.applied_at)
    .bind(&suggestion.id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            snapshot_key(id, 3),
            "profiles/00000000-0000-0000-0000-000000000000/v3.json"
        );
    }
}
