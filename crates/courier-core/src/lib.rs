//! Orchestration core and port definitions for Courier.
//!
//! This crate defines the ports (repository, engine, channel, and
//! summarizer traits) that the infrastructure layer implements, plus the
//! queueing, session, consolidation, and dispatch logic built on them. It
//! depends only on `courier-types`, never on `courier-infra` or any
//! process/network crate.

pub mod agent;
pub mod channel;
pub mod dispatch;
pub mod engine;
pub mod llm;
pub mod memory;
pub mod message;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
