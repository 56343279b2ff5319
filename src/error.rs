//! Error types for Synopsis Assist.

use std::time::Duration;

/// Top-level error type for session operations.
///
/// Collaborator failures (LLM, search) never reach it: the turn path
/// recovers from those locally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stale write for session {session_id}: expected revision {expected}, found {found}")]
    Conflict {
        session_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("No LLM provider configured: {0}")]
    NotConfigured(String),
}

/// Errors from the external research providers.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("{source_name} request failed: {reason}")]
    RequestFailed { source_name: String, reason: String },

    #[error("{source_name} returned HTTP {status}")]
    Status { source_name: String, status: u16 },

    #[error("Invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },

    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] LlmError),
}

/// Document generation errors.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document generation is locked: {filled} of {required} sections filled")]
    Locked { filled: usize, required: usize },

    #[error("Invalid document name: {0}")]
    InvalidName(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
