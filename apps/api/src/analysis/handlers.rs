//! Axum route handlers for the Analysis API.

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::analyzer::analyze_cv_match;
use crate::analysis::models::{AnalysisMetadata, AnalyzeRequest, AnalyzeResponse};
use crate::errors::AppError;
use crate::extraction::{extract_text, PdfUpload};
use crate::state::AppState;

/// Shortest accepted document, counted in characters after trimming.
pub const MIN_TEXT_CHARS: usize = 10;

pub const JOB_DESCRIPTION_FIELD: &str = "jobDescription";
pub const CV_FIELD: &str = "cv";

fn validate_text(label: &str, text: &str) -> Result<(), AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{label} cannot be empty")));
    }
    if trimmed.chars().count() < MIN_TEXT_CHARS {
        return Err(AppError::Validation(format!(
            "{label} must be at least {MIN_TEXT_CHARS} characters"
        )));
    }
    Ok(())
}

/// POST /api/v1/analyze
///
/// Analyzes plain-text job description and CV.
pub async fn handle_analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    validate_text("Job description", &request.job_description)?;
    validate_text("CV", &request.cv)?;

    let request_id = Uuid::new_v4();
    info!(%request_id, "Analyzing CV against job description");

    let result = analyze_cv_match(
        &state.llm,
        request.job_description.trim(),
        request.cv.trim(),
    )
    .await?;

    info!(%request_id, alignment = result.alignment, "Analysis complete");
    Ok(Json(AnalyzeResponse::new(result, None)))
}

/// POST /api/v1/analyze/upload
///
/// Multipart form with two PDF files, `jobDescription` and `cv`. Text is
/// extracted from both before analysis; the response carries extraction
/// metadata.
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut job_description = None;
    let mut cv = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let slot = match name.as_str() {
            JOB_DESCRIPTION_FIELD => &mut job_description,
            CV_FIELD => &mut cv,
            other => {
                debug!("Ignoring unexpected multipart field '{other}'");
                continue;
            }
        };

        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;

        *slot = Some(PdfUpload {
            field: name,
            content_type,
            bytes,
        });
    }

    let job_description = job_description.ok_or_else(|| {
        AppError::Validation(format!("{JOB_DESCRIPTION_FIELD} file is required"))
    })?;
    let cv = cv.ok_or_else(|| AppError::Validation(format!("{CV_FIELD} file is required")))?;

    let request_id = Uuid::new_v4();
    info!(%request_id, "Extracting text from uploaded PDFs");

    let (job_description_text, cv_text) =
        tokio::try_join!(extract_text(job_description), extract_text(cv))?;

    validate_text("Job description", &job_description_text)?;
    validate_text("CV", &cv_text)?;

    let metadata = AnalysisMetadata {
        job_description_length: job_description_text.chars().count(),
        cv_length: cv_text.chars().count(),
        extracted_at: Utc::now(),
    };

    let result = analyze_cv_match(&state.llm, &job_description_text, &cv_text).await?;

    info!(%request_id, alignment = result.alignment, "Analysis complete");
    Ok(Json(AnalyzeResponse::new(result, Some(metadata))))
}
