//! Error types for eventsieve.

use std::time::Duration;
use thiserror::Error;

/// Main error type for eventsieve operations.
///
/// Errors raised while sifting an input are never turned into a decision by
/// the library itself; they propagate up to the caller of the root sifter.
#[derive(Error, Debug)]
pub enum SieveError {
    /// A leaf matcher could not evaluate its predicate
    #[error("Match error: {0}")]
    Match(String),

    /// A guard condition attached to a modified sifter failed
    #[error("Guard condition failed: {0}")]
    Guard(#[source] Box<SieveError>),

    /// The rate limiter state store failed
    #[error("Rate limit error: {0}")]
    Limiter(String),

    /// The rate limiter state store did not answer in time
    #[error("Rate limit check timed out after {0:?}")]
    LimiterTimeout(Duration),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The host handed us an input we can't process
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for eventsieve operations.
pub type Result<T> = std::result::Result<T, SieveError>;
