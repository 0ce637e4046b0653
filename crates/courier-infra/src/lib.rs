//! Infrastructure layer for Courier.
//!
//! Implements the ports defined in `courier-core`: JSONL session logs and
//! memory documents on the filesystem, the Anthropic summarizer, and the
//! subprocess execution engine. Also loads `config.toml`.

pub mod config;
pub mod engine;
pub mod filesystem;
pub mod llm;
