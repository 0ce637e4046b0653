use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in courier-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from a consolidation attempt.
///
/// Every variant is recovered by the caller with a raw fallback history entry.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("consolidation timed out after {0:?}")]
    Timeout(Duration),

    #[error("summarizer failed: {0}")]
    Summarizer(#[from] LlmError),

    #[error("summarizer output could not be parsed")]
    Unparseable,

    #[error("memory storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors from the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine: {0}")]
    Spawn(String),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine stream ended before a final result")]
    StreamEnded,

    #[error("engine reported an error: {0}")]
    Reported(String),
}

/// Errors from a channel adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel '{0}' is not registered")]
    UnknownChannel(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}
