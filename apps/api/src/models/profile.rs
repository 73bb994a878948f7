use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::suggestions::models::InlineSuggestion;

/// One append-only version of a resume profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeProfileRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub version: i32,
    pub data: Value,
    pub s3_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InlineSuggestionRow {
    pub id: String,
    pub resume_id: Uuid,
    pub status: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
}

impl InlineSuggestionRow {
    /// The `status` and `applied_at` columns are authoritative over the JSON body.
    pub fn into_suggestion(self) -> Result<InlineSuggestion> {
        let mut suggestion: InlineSuggestion = serde_json::from_value(self.data)
            .with_context(|| format!("Stored suggestion {} has an invalid body", self.id))?;
        suggestion.status = serde_json::from_value(Value::String(self.status.clone()))
            .with_context(|| {
                format!("Stored suggestion {} has status '{}'", self.id, self.status)
            })?;
        suggestion.applied_at = self.applied_at;
        Ok(suggestion)
    }
}
