//! Dispatch loops between the message bus and the rest of the host.
//!
//! - `serializer` -- per-key FIFO chaining with garbage-collected tails
//! - `dispatcher` -- inbound loop with cross-key concurrency and `/stop`
//! - `outbound` -- outbound loop that delivers to channel adapters

pub mod dispatcher;
pub mod outbound;
pub mod serializer;

pub use dispatcher::Dispatcher;
pub use outbound::OutboundDispatcher;
pub use serializer::KeyedSerializer;
