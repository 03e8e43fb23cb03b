//! Error types for reason-core.

use thiserror::Error;

/// Result type alias using reason-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during reason-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// LLM API error
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: String, message: String },

    /// LLM error (simple variant)
    #[error("LLM error: {0}")]
    LLM(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Request/config validation failed before any work started
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required dependency could not be constructed
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// A reasoning strategy or pipeline step failed to produce a candidate
    #[error("Execution error: {0}")]
    Execution(String),

    /// The reflection judge could not reach a verdict
    #[error("Reflection error: {0}")]
    Reflection(String),

    /// Every retry/fallback path was exhausted
    #[error("Fallback exhausted: {0}")]
    Fallback(String),
}

impl Error {
    /// HTTP-status-like severity used by CLI exit codes and structured logs.
    ///
    /// Mirrors the status taxonomy carried by the orchestrator this crate
    /// replaces: validation failures map to 422, missing dependencies to
    /// 503, and so on. Nothing here actually serves HTTP; the numbers are
    /// a stable, externally meaningful severity code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::Initialization(_) => 503,
            Self::Execution(_) => 500,
            Self::Reflection(_) => 500,
            Self::Fallback(_) => 503,
            Self::Config(_) => 400,
            Self::Timeout { .. } => 504,
            Self::LlmApi { .. } => 502,
            Self::LLM(_) => 502,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an initialization error.
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization(message.into())
    }

    /// Create an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a reflection error.
    pub fn reflection(message: impl Into<String>) -> Self {
        Self::Reflection(message.into())
    }

    /// Create a fallback-exhausted error.
    pub fn fallback(message: impl Into<String>) -> Self {
        Self::Fallback(message.into())
    }

    /// Create an LLM API error.
    pub fn llm_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }
}
