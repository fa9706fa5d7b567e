//! CV / job description match analysis.

use tracing::{info, warn};

use crate::analysis::models::AnalysisResult;
use crate::analysis::parser::analysis_or_fallback;
use crate::analysis::prompts::build_analysis_prompt;
use crate::llm_client::{LlmClient, LlmError};

/// Analyzes `cv` against `job_description` through the LLM client.
///
/// Callers validate input length. Upstream and quota failures propagate as
/// [`LlmError`]; output that cannot be parsed yields the fallback result.
pub async fn analyze_cv_match(
    llm: &LlmClient,
    job_description: &str,
    cv: &str,
) -> Result<AnalysisResult, LlmError> {
    let prompt = build_analysis_prompt(job_description, cv);
    let text = llm.generate(prompt).await?;

    let (result, failure) = analysis_or_fallback(&text);
    match failure {
        Some(reason) => warn!(
            "Failed to parse AI response ({reason}); returning fallback. Raw response: {text}"
        ),
        None => info!("AI analysis parsed: alignment={}", result.alignment),
    }

    Ok(result)
}
