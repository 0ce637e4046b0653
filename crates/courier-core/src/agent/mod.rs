//! Conversation orchestration.
//!
//! - `orchestrator` -- `SessionOrchestrator`, the per-message pipeline
//! - `window` -- trim planning and recap rendering
//! - `prompt` -- system prompt, recap turn, and progress hint text
//! - `commands` -- slash command parsing
//! - `attachments` -- inbound media loading

pub mod attachments;
pub mod commands;
pub mod orchestrator;
pub mod prompt;
pub mod window;

pub use orchestrator::SessionOrchestrator;
