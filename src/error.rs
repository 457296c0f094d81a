//! Error types for mail triage.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },
}

/// Errors surfaced by the mail store bridge.
#[derive(Debug, thiserror::Error)]
pub enum MailStoreError {
    #[error("Message {id} not found in inbox or sent mailbox")]
    MessageNotFound { id: i64 },

    #[error("Message {id} found but label write was rejected: {reason}")]
    LabelRejected { id: i64, reason: String },

    #[error("Mail bridge failed: {0}")]
    Bridge(String),

    #[error("Mail bridge timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single transport record that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("record {index} has no end sentinel")]
    Unterminated { index: usize },

    #[error("record {index} has {found} fields, expected 5")]
    FieldCount { index: usize, found: usize },

    #[error("record {index} has non-integer id {raw:?}")]
    InvalidId { index: usize, raw: String },
}

/// The classification oracle could not be reached or did not answer.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classification call failed for message {id}: {source}")]
    Call {
        id: i64,
        #[source]
        source: LlmError,
    },
}

/// Run-level failures of the triage pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Fetch failed: {0}")]
    Fetch(#[source] MailStoreError),
}
