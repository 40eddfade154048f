//! Failure taxonomy of the indexing and search pipeline.
//!
//! Input-shape problems never show up here: the projector absorbs them.
//! Everything below is reported per record so operators can retry just the
//! failed subset.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// The embedding provider or the search service failed, timed out, or
    /// refused the credentials.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding input text is empty")]
    EmptyInput,

    /// The caller asked for something the pipeline cannot run.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The search service answered but rejected the document or query.
    #[error("rejected by index ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl PipelineError {
    pub fn provider(err: impl std::fmt::Display) -> Self {
        Self::ProviderUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<PipelineError>() {
            Ok(typed) => typed,
            Err(other) => Self::ProviderUnavailable(format!("{:#}", other)),
        }
    }
}
