//! Error types for the Warden domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them.
//!
//! A routing fallback is not an error: the router always answers with a
//! `RouteDecision`.

use thiserror::Error;

/// The top-level error type for all Warden operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Vector backend errors ---
    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    // --- Rule errors (safety patterns, consolidation DSL) ---
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Caller supplied something the store cannot accept (empty key,
    /// unsupported layer transition).
    #[error("Invalid memory request: {0}")]
    Validation(String),

    /// A long-term operation was attempted while the vector backend is
    /// not connected.
    #[error("Long-term memory is not connected; cannot {operation}")]
    NotConnected { operation: String },

    #[error("Memory entry not found: {key} ({layer})")]
    NotFound { key: String, layer: String },

    #[error("Vector backend failed: {0}")]
    Backend(#[from] VectorStoreError),
}

#[derive(Debug, Clone, Error)]
pub enum VectorStoreError {
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("Vector store request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode vector store response: {0}")]
    Decode(String),

    #[error("Vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error("Failed to parse rule '{rule}': {detail}")]
    Parse { rule: String, detail: String },

    #[error("Invalid pattern in rule '{rule}': {detail}")]
    InvalidPattern { rule: String, detail: String },

    #[error("Rule '{rule}' failed: {detail}")]
    Evaluation { rule: String, detail: String },
}
