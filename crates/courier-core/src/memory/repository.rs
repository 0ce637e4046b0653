//! MemoryRepository trait definition.
//!
//! Two plain-text documents per workspace: the long-term memory that is
//! replaced wholesale, and the append-only history log.

use courier_types::error::RepositoryError;

/// Repository trait for long-term memory and history persistence.
///
/// Implementations live in courier-infra (e.g., `FileMemoryRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Writers go through [`ConsolidationSlot`](super::pipeline::ConsolidationSlot);
/// readers outside the pipeline (CLI, system prompt) use the read methods
/// directly.
pub trait MemoryRepository: Send + Sync {
    /// Current long-term memory text. Empty when none has been written.
    fn read_memory(
        &self,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Replace the long-term memory text.
    fn write_memory(
        &self,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append one entry to the history log, followed by a blank line.
    fn append_history(
        &self,
        entry: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Full history log text. Empty when nothing has been appended.
    fn read_history(
        &self,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;
}
