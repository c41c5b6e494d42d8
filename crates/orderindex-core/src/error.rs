//! Error types for the indexing pipeline.

use thiserror::Error;

/// Errors that can occur while indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("checkpoint {checkpoint} is ahead of chain height {height}")]
    InvalidCheckpoint { checkpoint: u64, height: u64 },

    #[error("malformed {event} event at block {block_number}: {reason}")]
    MalformedEvent {
        event: String,
        block_number: u64,
        reason: String,
    },

    #[error("no handler for topic {topic} at block {block_number}")]
    UnknownEvent { topic: String, block_number: u64 },

    #[error("{entity} {id} already exists downstream")]
    SinkConflict { entity: &'static str, id: i64 },

    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("no checkpoint for {source_key} and no seed configured")]
    NoCheckpoint { source_key: String },

    #[error("checkpoint storage error: {0}")]
    Storage(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IndexerError {
    /// Returns `true` for transient failures that a later pass may clear.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChainUnavailable(_)
                | Self::SinkUnavailable(_)
                | Self::Storage(_)
                | Self::Timeout { .. }
        )
    }

    /// Returns `true` for conditions that need an operator and must stop the
    /// poll loop instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoCheckpoint { .. } | Self::Config(_))
    }

    /// Returns `true` if this is the idempotent-create collision signal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SinkConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(IndexerError::ChainUnavailable("eof".into()).is_retryable());
        assert!(IndexerError::Timeout { ms: 10 }.is_retryable());
        assert!(!IndexerError::InvalidCheckpoint { checkpoint: 2, height: 1 }.is_retryable());
        assert!(IndexerError::NoCheckpoint { source_key: "1:0x0".into() }.is_fatal());
        assert!(!IndexerError::SinkUnavailable("503".into()).is_fatal());
        assert!(IndexerError::SinkConflict { entity: "order", id: 7 }.is_conflict());
    }
}
