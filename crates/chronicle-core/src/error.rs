use std::io;
use thiserror::Error;

/// Error taxonomy shared by every backend adapter and the layers above.
///
/// Adapters map native engine errors into this fixed set and never invent
/// additional kinds: `ConnectionFailure` for anything transient the caller
/// may retry, `BackendRejected` for refusals that need operator action,
/// `NotFound` for an absent target. The remaining variants belong to the
/// domain layers (validation, dedup, authorization, configuration).
#[derive(Error, Debug)]
pub enum ChronicleError {
    #[error("backend unreachable: {0}")]
    ConnectionFailure(String),

    #[error("backend rejected operation: {0}")]
    BackendRejected(String),

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ChronicleError {
    /// Whether automated retry of the failed operation is appropriate.
    ///
    /// Only `ConnectionFailure` qualifies; everything else needs a changed
    /// request or operator intervention first.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, ChronicleError>;
