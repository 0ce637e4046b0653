//! Message processor trait for the dispatch loop.
//!
//! The dispatcher owns ordering and cancellation; a processor owns what
//! happens to one inbound message. `SessionOrchestrator` is the production
//! implementation.

use courier_types::message::InboundMessage;
use tokio_util::sync::CancellationToken;

/// Trait for handling one inbound message.
///
/// The dispatcher calls `process` at most once at a time per conversation
/// key, in arrival order. Replies are published by the processor itself so
/// it can stream progress before the final answer.
pub trait MessageProcessor: Send + Sync + 'static {
    /// Handle one inbound message.
    ///
    /// `cancel` fires when the user interrupts the conversation; the
    /// processor should stop at its next suspension point.
    fn process(
        &self,
        message: InboundMessage,
        cancel: CancellationToken,
    ) -> impl std::future::Future<Output = ()> + Send;
}
