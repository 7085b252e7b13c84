//! Error types for the TaskHelm domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Expected user-flow states ("no plan yet", "no plans found") are *not*
//! errors — the operations return conversational strings for those. The
//! variants here cover backend failures and broken invariants only.

use thiserror::Error;

/// The top-level error type for all TaskHelm operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Plan errors ---
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// `ask` was called before corpus ingestion completed.
    #[error("Retriever not initialized — corpus ingestion has not run")]
    Uninitialized,

    #[error("Corpus ingestion failed: {0}")]
    IngestionFailed(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Index storage error: {0}")]
    Storage(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Answer synthesis failed: {0}")]
    SynthesisFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum PlanError {
    /// Save was requested with an empty plan slot.
    #[error("No current plan in the session")]
    NoCurrentPlan,

    /// The persisted template text is not syntactically parseable.
    #[error("Malformed plan template at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("Plan file error: {path}: {reason}")]
    File { path: String, reason: String },

    /// A step's tool invocation failed mid-execution. Earlier steps'
    /// side effects stand — there is no rollback.
    #[error("Plan step failed: {step} — {reason}")]
    StepFailed { step: String, reason: String },

    /// A plan step tried to re-enter execution of the running plan.
    #[error("Plan execution is already in progress")]
    AlreadyExecuting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn plan_parse_error_carries_offset() {
        let err = Error::Plan(PlanError::Parse {
            offset: 42,
            message: "unterminated block".into(),
        });
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn retrieval_uninitialized_message() {
        let err = Error::Retrieval(RetrievalError::Uninitialized);
        assert!(err.to_string().contains("not initialized"));
    }
}
