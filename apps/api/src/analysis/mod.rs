// CV / job description match analysis.
// All upstream calls go through llm_client; nothing here talks HTTP to the model.

pub mod analyzer;
pub mod handlers;
pub mod models;
pub mod parser;
pub mod prompts;
