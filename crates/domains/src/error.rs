//! # AppError
//!
//! Centralized error handling for the TechSpace ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid bearer credentials
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Rate limit exceeded for the calling subject
    #[error("too many requests: {0}")]
    RateLimited(String),

    /// Payload or field constraint violation
    #[error("validation error: {0}")]
    Validation(String),

    /// Uniqueness or immutability violation (e.g. username taken)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Resource not found (e.g. Thread, Profile)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Identity provider or document store failure
    #[error("upstream service error: {0}")]
    Upstream(String),

    /// A transactional commit observed a concurrent write to its read set.
    /// Absorbed by the bounded retry loop in the protocol layer; never
    /// crosses the API boundary.
    #[error("transaction aborted by concurrent write")]
    TxnConflict,

    /// Infrastructure failure with no better classification
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("document (de)serialization failed: {err}"))
    }
}

/// A specialized Result type for TechSpace logic.
pub type Result<T> = std::result::Result<T, AppError>;
