//! Per-conversation session state.
//!
//! `SessionLogRepository` is the durable port implemented in courier-infra;
//! `SessionStore` layers the write-through cache and the append, clear, and
//! trim operations on top of it.

pub mod repository;
pub mod store;

pub use repository::SessionLogRepository;
pub use store::SessionStore;
