use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::ResumeProfileRow;
use crate::state::AppState;
use crate::suggestions::generator::scan;
use crate::suggestions::grouping::{
    group_suggestions, sort_suggestions_by_priority, SuggestionGroup,
};
use crate::suggestions::models::{InlineSuggestion, SuggestionContext, TargetSection};
use crate::suggestions::patch::{apply_batch, BatchResult, SkippedSuggestion};
use crate::suggestions::review::{
    apply_suggestions_to_profile, review_suggestion, ReviewDecision,
};
use crate::suggestions::scoring::{scan_profile, score_profile, ProfileScore};
use crate::suggestions::store::{
    get_current_profile, get_suggestion, insert_suggestions, list_pending_suggestions,
    record_resolution, save_profile_version, ProfileVersion,
};

// ────────────────────────────────────────────────────────────────────────────
// Stateless text endpoints
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ScanRequest {
    pub text: String,
    #[serde(flatten)]
    pub context: SuggestionContext,
}

#[derive(Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<InlineSuggestion>,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub backend: &'static str,
    pub suggestions: Vec<InlineSuggestion>,
}

#[derive(Deserialize)]
pub struct SuggestionListRequest {
    pub suggestions: Vec<InlineSuggestion>,
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub text: String,
    pub suggestions: Vec<InlineSuggestion>,
}

/// POST /api/v1/suggestions/scan
pub async fn handle_scan(Json(req): Json<ScanRequest>) -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: scan(&req.text, &req.context),
    })
}

/// POST /api/v1/suggestions/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Json<GenerateResponse> {
    let suggestions = state.suggester.generate(&req.text, &req.context).await;
    Json(GenerateResponse {
        backend: state.suggester.backend(),
        suggestions,
    })
}

/// POST /api/v1/suggestions/group
pub async fn handle_group(Json(req): Json<SuggestionListRequest>) -> Json<Vec<SuggestionGroup>> {
    Json(group_suggestions(&req.suggestions))
}

/// POST /api/v1/suggestions/prioritize
pub async fn handle_prioritize(
    Json(req): Json<SuggestionListRequest>,
) -> Json<Vec<InlineSuggestion>> {
    Json(sort_suggestions_by_priority(&req.suggestions))
}

/// POST /api/v1/suggestions/apply
pub async fn handle_apply(Json(req): Json<ApplyRequest>) -> Json<BatchResult> {
    Json(apply_batch(&req.text, &req.suggestions))
}

// ────────────────────────────────────────────────────────────────────────────
// Upload scan
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UploadScanResponse {
    pub text: String,
    pub suggestions: Vec<InlineSuggestion>,
}

/// POST /api/v1/suggestions/upload
///
/// Multipart parts: `file` (PDF or UTF-8 text, required), and optional `section`,
/// `item_id` and `field` text parts. Section defaults to `summary`.
pub async fn handle_upload(mut multipart: Multipart) -> Result<Json<UploadScanResponse>, AppError> {
    let mut file: Option<(Bytes, bool)> = None;
    let mut section = TargetSection::Summary;
    let mut item_id: Option<String> = None;
    let mut field: Option<String> = None;

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = part.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let declared_pdf = part.content_type() == Some("application/pdf")
                    || part
                        .file_name()
                        .is_some_and(|f| f.to_ascii_lowercase().ends_with(".pdf"));
                let data = part
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                file = Some((data, declared_pdf));
            }
            "section" | "item_id" | "field" => {
                let value = part
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
                match name.as_str() {
                    "section" => {
                        section = serde_json::from_value(Value::String(value.clone())).map_err(
                            |_| AppError::Validation(format!("Unknown section '{value}'")),
                        )?
                    }
                    "item_id" => item_id = Some(value).filter(|v| !v.is_empty()),
                    _ => field = Some(value).filter(|v| !v.is_empty()),
                }
            }
            other => warn!("Ignoring unexpected multipart field '{other}'"),
        }
    }

    let (data, declared_pdf) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' part".to_string()))?;
    let text = extract_upload_text(data, declared_pdf).await?;
    let context = SuggestionContext {
        section,
        item_id,
        field,
    };
    let suggestions = scan(&text, &context);

    info!(
        "Upload scan: {} chars, {} suggestion(s)",
        text.chars().count(),
        suggestions.len()
    );
    Ok(Json(UploadScanResponse { text, suggestions }))
}

async fn extract_upload_text(data: Bytes, declared_pdf: bool) -> Result<String, AppError> {
    if declared_pdf || data.starts_with(b"%PDF") {
        // pdf-extract is CPU-bound and synchronous.
        let extracted =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                .await
                .map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}"))
                })?;
        return extracted
            .map(|text| text.trim().to_string())
            .map_err(|e| AppError::UnprocessableEntity(format!("Could not read PDF: {e}")));
    }

    String::from_utf8(data.to_vec()).map_err(|_| {
        AppError::UnprocessableEntity("Upload is neither a PDF nor UTF-8 text".to_string())
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Stored resume profiles
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ProfileScanResponse {
    pub backend: &'static str,
    pub suggestions: Vec<InlineSuggestion>,
    pub score: ProfileScore,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub suggestion: InlineSuggestion,
    /// Present when the review produced a new profile version.
    pub profile_version: Option<ProfileVersion>,
}

#[derive(Serialize)]
pub struct ApplyAllResponse {
    pub applied: Vec<InlineSuggestion>,
    pub skipped: Vec<SkippedSuggestion>,
    pub profile_version: Option<ProfileVersion>,
}

async fn load_profile(state: &AppState, resume_id: Uuid) -> Result<ResumeProfileRow, AppError> {
    get_current_profile(&state.db, resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} has no profile")))
}

fn version_conflict(resume_id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "Profile for resume {resume_id} changed while the request was running; retry"
    ))
}

/// PUT /api/v1/resumes/:id/profile
pub async fn handle_put_profile(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Json(profile): Json<Value>,
) -> Result<(StatusCode, Json<ProfileVersion>), AppError> {
    if !profile.is_object() {
        return Err(AppError::Validation(
            "Profile must be a JSON object".to_string(),
        ));
    }
    let base_version = get_current_profile(&state.db, resume_id)
        .await?
        .map_or(0, |row| row.version);

    let mut tx = state.db.begin().await?;
    let saved = save_profile_version(
        &mut tx,
        &state.s3,
        &state.config.s3_bucket,
        resume_id,
        base_version,
        &profile,
    )
    .await?
    .ok_or_else(|| version_conflict(resume_id))?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/v1/resumes/:id/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ResumeProfileRow>, AppError> {
    Ok(Json(load_profile(&state, resume_id).await?))
}

/// POST /api/v1/resumes/:id/scan
///
/// Stores only suggestions that are not already pending.
pub async fn handle_scan_profile(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ProfileScanResponse>, AppError> {
    let row = load_profile(&state, resume_id).await?;
    let existing = list_pending_suggestions(&state.db, resume_id).await?;
    let suggestions: Vec<InlineSuggestion> = scan_profile(&row.data, state.suggester.as_ref())
        .await
        .into_iter()
        .filter(|s| !existing.iter().any(|e| e.same_edit(s)))
        .collect();
    insert_suggestions(&state.db, resume_id, &suggestions).await?;

    Ok(Json(ProfileScanResponse {
        backend: state.suggester.backend(),
        suggestions,
        score: score_profile(&row.data),
    }))
}

/// GET /api/v1/resumes/:id/suggestions
///
/// Pending suggestions grouped by target; groups ordered by their top-priority member.
pub async fn handle_list_suggestions(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<Vec<SuggestionGroup>>, AppError> {
    let pending = list_pending_suggestions(&state.db, resume_id).await?;
    Ok(Json(group_suggestions(&sort_suggestions_by_priority(&pending))))
}

/// GET /api/v1/resumes/:id/score
pub async fn handle_score(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ProfileScore>, AppError> {
    let row = load_profile(&state, resume_id).await?;
    Ok(Json(score_profile(&row.data)))
}

/// POST /api/v1/resumes/:id/suggestions/:sid/review
pub async fn handle_review(
    State(state): State<AppState>,
    Path((resume_id, suggestion_id)): Path<(Uuid, String)>,
    Json(decision): Json<ReviewDecision>,
) -> Result<Json<ReviewResponse>, AppError> {
    let row = load_profile(&state, resume_id).await?;
    let suggestion = get_suggestion(&state.db, resume_id, &suggestion_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Suggestion {suggestion_id} not found")))?;

    let reviewed = review_suggestion(&row.data, &suggestion, &decision)?;

    let mut tx = state.db.begin().await?;
    if !record_resolution(&mut tx, &reviewed.suggestion).await? {
        return Err(AppError::Conflict(format!(
            "Suggestion {suggestion_id} was resolved by another request"
        )));
    }
    let profile_version = if reviewed.profile_changed {
        let saved = save_profile_version(
            &mut tx,
            &state.s3,
            &state.config.s3_bucket,
            resume_id,
            row.version,
            &reviewed.profile,
        )
        .await?
        .ok_or_else(|| version_conflict(resume_id))?;
        Some(saved)
    } else {
        None
    };
    tx.commit().await?;

    Ok(Json(ReviewResponse {
        suggestion: reviewed.suggestion,
        profile_version,
    }))
}

/// POST /api/v1/resumes/:id/suggestions/apply-all
pub async fn handle_apply_all(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ApplyAllResponse>, AppError> {
    let row = load_profile(&state, resume_id).await?;
    let pending = list_pending_suggestions(&state.db, resume_id).await?;
    let (patched, report) = apply_suggestions_to_profile(&row.data, &pending);

    if report.applied.is_empty() {
        return Ok(Json(ApplyAllResponse {
            applied: report.applied,
            skipped: report.skipped,
            profile_version: None,
        }));
    }

    let mut tx = state.db.begin().await?;
    for suggestion in &report.applied {
        if !record_resolution(&mut tx, suggestion).await? {
            return Err(AppError::Conflict(format!(
                "Suggestion {} was resolved by another request",
                suggestion.id
            )));
        }
    }
    let saved = save_profile_version(
        &mut tx,
        &state.s3,
        &state.config.s3_bucket,
        resume_id,
        row.version,
        &patched,
    )
    .await?
    .ok_or_else(|| version_conflict(resume_id))?;
    tx.commit().await?;

    Ok(Json(ApplyAllResponse {
        applied: report.applied,
        skipped: report.skipped,
        profile_version: Some(saved),
    }))
}
