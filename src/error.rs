//! Error types for the style-learning engine.

use thiserror::Error;

/// Domain errors surfaced by the learning, buffering, and clustering engines.
///
/// `ProfileNotFound`, `NoClusters`, and `InsufficientData` are recoverable by
/// the caller (fall back to defaults or wait for more data). Analyzer and
/// store failures are surfaced unrecovered; proceeding with a partial result
/// would corrupt running averages.
#[derive(Debug, Error)]
pub enum StyleError {
    /// No learning profile exists for the user.
    #[error("no style profile found for user {user_id}")]
    ProfileNotFound { user_id: String },

    /// No reply clusters exist for the user.
    #[error("no reply clusters found for user {user_id}")]
    NoClusters { user_id: String },

    /// Fewer historical samples than the requested cluster count.
    #[error("insufficient data for clustering: {available} pairs, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    /// A buffered sample carried an unknown source tag.
    #[error("invalid sample source '{value}', expected 'written' or 'edited'")]
    InvalidSource { value: String },

    /// The text-analysis collaborator failed or returned a malformed response.
    #[error("text analyzer failure: {0}")]
    Analyzer(anyhow::Error),

    /// The persistence layer failed.
    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),

    /// The store's backing file or directory could not be created.
    #[error("store io failure: {0}")]
    Io(#[from] std::io::Error),

    /// A stored JSON column could not be encoded or decoded.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StyleError {
    /// True for conditions the caller can recover from by falling back to
    /// defaults or waiting for more data.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StyleError::ProfileNotFound { .. }
                | StyleError::NoClusters { .. }
                | StyleError::InsufficientData { .. }
                | StyleError::InvalidSource { .. }
        )
    }
}
