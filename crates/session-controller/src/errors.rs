//! Session Controller error types.
//!
//! Registry operations on unknown sessions do not produce errors; they
//! degrade to empty results so connection-handling code stays simple.
//! Everything that talks to an external collaborator (media provider, flag
//! store, transport) surfaces its failure so the caller can retry or alert.
//! Internal details are logged server-side but not exposed to clients.

use thiserror::Error;

/// Session Controller error type.
///
/// Maps to client-facing error codes:
/// - `NotFound`: `NOT_FOUND` (4)
/// - `AlreadyStarted`: `CONFLICT` (5)
/// - `FlagStore`, `Delivery`, `Config`, `Internal`: `INTERNAL_ERROR` (6)
/// - `ProviderUnavailable`, `PartialFailure`: `UNAVAILABLE` (8)
#[derive(Debug, Error)]
pub enum ScError {
    /// Unknown session name.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The media provider failed to create a session or mint a token.
    #[error("Media provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// At least one token request of a batch failed; the batch is discarded.
    #[error("Token generation failed for {failed} of {total} participants")]
    PartialFailure { failed: usize, total: usize },

    /// Another trigger already started the scheduler for this session.
    #[error("Scheduler already started for session: {0}")]
    AlreadyStarted(String),

    /// Durable flag store operation failed.
    #[error("Flag store error: {0}")]
    FlagStore(String),

    /// A single event could not be handed to a connection.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor gone, channel closed).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScError {
    /// Returns the client-facing error code for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            ScError::NotFound(_) => 4,        // NOT_FOUND
            ScError::AlreadyStarted(_) => 5, // CONFLICT
            ScError::FlagStore(_)
            | ScError::Delivery(_)
            | ScError::Config(_)
            | ScError::Internal(_) => 6, // INTERNAL_ERROR
            ScError::ProviderUnavailable(_) | ScError::PartialFailure { .. } => 8, // UNAVAILABLE
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            ScError::NotFound(_) => "Session not found".to_string(),
            ScError::AlreadyStarted(_) => "Session has already started".to_string(),
            ScError::ProviderUnavailable(_) | ScError::PartialFailure { .. } => {
                "Media service is unavailable, please try again".to_string()
            }
            ScError::FlagStore(_)
            | ScError::Delivery(_)
            | ScError::Config(_)
            | ScError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Whether the failure came from an external collaborator and may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScError::ProviderUnavailable(_) | ScError::PartialFailure { .. } | ScError::FlagStore(_)
        )
    }
}
