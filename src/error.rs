//! Triage error taxonomy. Input errors reject a single event, dependency
//! errors retry or degrade, state errors surface immediately.

use crate::response::ActionStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TriageError {
    /// Event does not satisfy the declared schema version. Rejects the event,
    /// never the pipeline.
    #[error("schema mismatch (version {version}): {detail}")]
    SchemaMismatch { version: u32, detail: String },

    /// No anomaly model is installed in the scorer handle.
    #[error("no anomaly model loaded")]
    ModelUnavailable,

    /// Transient reasoning-service failure; retryable with backoff.
    #[error("reasoning service unavailable: {0}")]
    ReasoningUnavailable(String),

    /// The service answered but the response could not be parsed into a
    /// ThreatAssessment. Non-retryable; treated as a missing assessment.
    #[error("reasoning response malformed: {0}")]
    ReasoningMalformed(String),

    /// A state transition was requested from a state that does not permit
    /// it. Caller error; never absorbed silently.
    #[error("invalid transition: {requested} from {from:?}")]
    InvalidTransition {
        from: ActionStatus,
        requested: &'static str,
    },

    /// No action record with this id.
    #[error("unknown action record {0}")]
    UnknownRecord(Uuid),

    /// Embedding dimensionality does not match the index.
    #[error("embedding dimension {got}, index expects {expected}")]
    EmbeddingDimension { expected: usize, got: usize },

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Payload encryption or integrity failure in the alert store.
    #[error("crypto error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TriageError>;
