//! Shared domain types for Courier.
//!
//! This crate contains the data shapes used across the Courier host:
//! conversation sessions, bus messages, consolidation results, execution
//! engine events, summarizer requests, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod memory;
pub mod message;
pub mod session;
