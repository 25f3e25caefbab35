// Resume content generation.
// Implements: content loading, prompt building, the LLM call and reconciliation
// of the model's JSON back onto stored records.
// All LLM calls go through llm_client::TextGenerator.

pub mod content;
pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod reconcile;
pub mod skills;

use thiserror::Error;

use crate::llm_client::LlmError;

/// Failure modes of a generation request. There is no partial success:
/// any of these aborts the whole request.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to read resume records: {0}")]
    StorageRead(#[from] sqlx::Error),

    #[error("stored records are inconsistent: {0}")]
    InconsistentRecords(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("generation service failed: {0}")]
    ExternalService(#[from] LlmError),

    #[error("model output contained no parseable JSON array: {0}")]
    MalformedOutput(String),

    #[error("model returned content id '{content_id}': {reason}")]
    ReconciliationMismatch {
        content_id: String,
        reason: &'static str,
    },
}
