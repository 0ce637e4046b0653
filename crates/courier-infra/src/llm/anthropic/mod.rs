//! Anthropic Messages API summarizer.
//!
//! [`AnthropicProvider`] implements
//! [`LlmProvider`](courier_core::llm::LlmProvider) with a single non-streaming
//! call to `/v1/messages`.

pub mod client;
pub mod types;

pub use client::AnthropicProvider;
