//! Message bus between channel adapters and the orchestrator.
//!
//! The `MessageBus` is two independent [`CancellableQueue`]s: inbound
//! (channel -> orchestrator) and outbound (orchestrator -> channel). Closing
//! the bus closes both, which is the single shutdown trigger for the inbound
//! consumer loop and the outbound dispatch loop.

use courier_types::message::{InboundMessage, OutboundMessage};
use tracing::debug;

use super::queue::CancellableQueue;

/// Inbound and outbound queues with a shared close.
pub struct MessageBus {
    inbound: CancellableQueue<InboundMessage>,
    outbound: CancellableQueue<OutboundMessage>,
}

impl MessageBus {
    /// Create an open bus with empty queues.
    pub fn new() -> Self {
        Self {
            inbound: CancellableQueue::new(),
            outbound: CancellableQueue::new(),
        }
    }

    /// Publish a message received from a channel adapter.
    pub fn publish_inbound(&self, msg: InboundMessage) {
        if self.inbound.is_closed() {
            debug!(channel = %msg.channel, chat_id = %msg.chat_id, "bus closed, inbound message dropped");
            return;
        }
        self.inbound.push(msg);
    }

    /// Wait for the next inbound message. `None` means the bus is closed.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inbound.pop().await
    }

    /// Publish a message for delivery by a channel adapter.
    pub fn publish_outbound(&self, msg: OutboundMessage) {
        if self.outbound.is_closed() {
            debug!(channel = %msg.channel, chat_id = %msg.chat_id, "bus closed, outbound message dropped");
            return;
        }
        self.outbound.push(msg);
    }

    /// Wait for the next outbound message. `None` means the bus is closed.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound.pop().await
    }

    /// Close both queues, unblocking every consumer.
    pub fn close(&self) {
        self.inbound.close();
        self.outbound.close();
        debug!("message bus closed");
    }

    /// Whether the bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }

    /// Number of buffered inbound messages.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Number of buffered outbound messages.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("inbound", &self.inbound_len())
            .field("outbound", &self.outbound_len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn inbound_and_outbound_are_independent() {
        let bus = MessageBus::new();
        bus.publish_inbound(InboundMessage::new("cli", "user", "direct", "in"));
        bus.publish_outbound(OutboundMessage::new("cli", "direct", "out"));

        assert_eq!(bus.inbound_len(), 1);
        assert_eq!(bus.outbound_len(), 1);

        let out = bus.consume_outbound().await.unwrap();
        assert_eq!(out.content, "out");
        let inbound = bus.consume_inbound().await.unwrap();
        assert_eq!(inbound.content, "in");
    }

    #[tokio::test]
    async fn close_unblocks_both_consumers() {
        let bus = Arc::new(MessageBus::new());

        let inbound_loop = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                let mut n = 0;
                while bus.consume_inbound().await.is_some() {
                    n += 1;
                }
                n
            })
        };
        let outbound_loop = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                let mut n = 0;
                while bus.consume_outbound().await.is_some() {
                    n += 1;
                }
                n
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.close();

        let (a, b) = tokio::time::timeout(Duration::from_secs(1), async {
            (inbound_loop.await.unwrap(), outbound_loop.await.unwrap())
        })
        .await
        .unwrap();
        assert_eq!((a, b), (0, 0));
    }

    #[tokio::test]
    async fn buffered_messages_survive_close() {
        let bus = MessageBus::new();
        bus.publish_inbound(InboundMessage::new("cli", "user", "direct", "first"));
        bus.publish_outbound(OutboundMessage::new("cli", "direct", "reply"));
        bus.close();

        assert_eq!(bus.consume_inbound().await.unwrap().content, "first");
        assert!(bus.consume_inbound().await.is_none());
        assert_eq!(bus.consume_outbound().await.unwrap().content, "reply");
        assert!(bus.consume_outbound().await.is_none());
    }

    #[tokio::test]
    async fn publish_after_close_is_dropped() {
        let bus = MessageBus::new();
        bus.close();
        bus.publish_inbound(InboundMessage::new("cli", "user", "direct", "late"));
        bus.publish_outbound(OutboundMessage::new("cli", "direct", "late"));
        assert_eq!(bus.inbound_len(), 0);
        assert_eq!(bus.outbound_len(), 0);
        assert!(bus.is_closed());
    }

    #[test]
    fn debug_impl() {
        let bus = MessageBus::new();
        let debug = format!("{bus:?}");
        assert!(debug.contains("MessageBus"));
        assert!(debug.contains("inbound"));
    }
}
