// Prompt constants for CV / job description match analysis.

/// System instruction. Defines the JSON shape the parser expects.
pub const ANALYSIS_SYSTEM: &str = r#"You are an expert HR analyst. Analyze the candidate's CV against the job description and provide detailed feedback.

Return your analysis in this JSON format:
{
  "strengths": ["specific strength 1", "specific strength 2"],
  "weaknesses": ["specific weakness 1", "specific weakness 2"],
  "alignment": number (0-100),
  "recommendations": ["actionable recommendation 1", "actionable recommendation 2"],
  "summary": "brief overall assessment"
}"#;

/// User message template. Replace `{job_description}` and `{cv}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Please analyze this candidate's CV against the job description:

JOB DESCRIPTION:
{job_description}

CANDIDATE CV:
{cv}

Focus on technical skills alignment, experience relevance, and overall suitability. Return only valid JSON."#;

/// Full prompt text: system instruction, blank line, filled-in user template.
pub fn build_analysis_prompt(job_description: &str, cv: &str) -> String {
    // CV first: the job description slot precedes it, so a placeholder-like
    // string inside either document is never expanded.
    let user = ANALYSIS_PROMPT_TEMPLATE
        .replacen("{cv}", cv, 1)
        .replacen("{job_description}", job_description, 1);
    format!("{ANALYSIS_SYSTEM}\n\n{user}")
}
