use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured match analysis. `alignment` is always within 0–100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub alignment: u8,
    pub recommendations: Vec<String>,
    pub summary: String,
}

/// Descriptive information the upload route attaches to a result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub job_description_length: usize,
    pub cv_length: usize,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub job_description: String,
    pub cv: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisData {
    #[serde(flatten)]
    pub result: AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AnalysisMetadata>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub data: AnalysisData,
    pub timestamp: DateTime<Utc>,
}

impl AnalyzeResponse {
    pub fn new(result: AnalysisResult, metadata: Option<AnalysisMetadata>) -> Self {
        Self {
            success: true,
            data: AnalysisData { result, metadata },
            timestamp: Utc::now(),
        }
    }
}
