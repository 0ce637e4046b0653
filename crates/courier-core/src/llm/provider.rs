//! LlmProvider trait definition.
//!
//! The consolidation pipeline only needs one-shot completions, so the
//! provider surface is a name and a `complete` call.

use courier_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends used for summarization.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in courier-infra (e.g., `AnthropicProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
