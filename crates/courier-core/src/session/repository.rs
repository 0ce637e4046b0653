//! SessionLogRepository trait definition.
//!
//! The durable side of the session store: one append-only log per
//! conversation key, rewritten wholesale on trim and clear.

use courier_types::error::RepositoryError;
use courier_types::session::{ConversationEntry, Session, SessionMetadata};

/// Repository trait for session log persistence.
///
/// Implementations live in courier-infra (e.g., `JsonlSessionRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionLogRepository: Send + Sync {
    /// Load a session log. `Ok(None)` when no log exists for the key.
    ///
    /// Malformed entry records are skipped by the implementation, never
    /// surfaced as errors.
    fn load(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Append one entry, writing `metadata` first if the log does not exist yet.
    fn append(
        &self,
        metadata: &SessionMetadata,
        entry: &ConversationEntry,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace the whole log with the session's metadata and messages.
    fn rewrite(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Conversation keys that have a durable log.
    fn list_keys(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}
