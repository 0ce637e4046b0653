//! In-process message plumbing between channel adapters and the orchestrator.
//!
//! - `queue` -- `CancellableQueue`, a FIFO whose close unblocks every waiter
//! - `bus` -- `MessageBus`, the inbound/outbound queue pair with one shutdown switch
//! - `handler` -- `MessageProcessor`, the per-message seam the dispatcher drives

pub mod bus;
pub mod handler;
pub mod queue;

pub use bus::MessageBus;
pub use handler::MessageProcessor;
pub use queue::CancellableQueue;
