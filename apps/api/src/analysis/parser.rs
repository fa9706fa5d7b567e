//! Turns free-form model output into an [`AnalysisResult`].
//!
//! Everything here is pure. Output that cannot be parsed is never an error
//! for the caller; [`analysis_or_fallback`] substitutes [`fallback_result`].

use serde::Deserialize;
use thiserror::Error;

use crate::analysis::models::AnalysisResult;

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("model output does not match the analysis shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Shape the model is asked to produce. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    alignment: f64,
    recommendations: Vec<String>,
    summary: String,
}

/// The widest `{ ... }` span: first `{` through last `}`.
///
/// Prose before and after the object is dropped. Returns `None` when there is
/// no opening brace followed by a closing one.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Clamps to 0–100 and rounds to the nearest integer.
pub fn clamp_alignment(score: f64) -> u8 {
    score.clamp(0.0, 100.0).round() as u8
}

pub fn parse_analysis(text: &str) -> Result<AnalysisResult, ParseFailure> {
    let json = extract_json_block(text).ok_or(ParseFailure::NoJsonObject)?;
    let raw: RawAnalysis = serde_json::from_str(json)?;

    Ok(AnalysisResult {
        strengths: raw.strengths,
        weaknesses: raw.weaknesses,
        alignment: clamp_alignment(raw.alignment),
        recommendations: raw.recommendations,
        summary: raw.summary,
    })
}

/// Fixed placeholder returned when the model output cannot be used.
pub fn fallback_result() -> AnalysisResult {
    AnalysisResult {
        strengths: vec!["Unable to parse AI response - technical skills noted".to_string()],
        weaknesses: vec!["AI response parsing failed - manual review needed".to_string()],
        alignment: 50,
        recommendations: vec!["Please review manually due to AI parsing error".to_string()],
        summary: "AI analysis completed but response parsing failed".to_string(),
    }
}

/// Parsed analysis, or the fallback together with the reason it was needed.
pub fn analysis_or_fallback(text: &str) -> (AnalysisResult, Option<ParseFailure>) {
    match parse_analysis(text) {
        Ok(result) => (result, None),
        Err(failure) => (fallback_result(), Some(failure)),
    }
}
