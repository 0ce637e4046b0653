//! Outbound dispatch loop: delivers bus messages to their channel adapter.

use std::collections::HashMap;
use std::sync::Arc;

use courier_types::error::ChannelError;
use tracing::{debug, error, warn};

use crate::channel::BoxChannel;
use crate::message::MessageBus;

/// Routes outbound messages to channels by name.
///
/// Delivery failures are logged and never stop the loop.
pub struct OutboundDispatcher {
    bus: Arc<MessageBus>,
    channels: HashMap<String, BoxChannel>,
}

impl OutboundDispatcher {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            channels: HashMap::new(),
        }
    }

    /// Register a channel under its own name, replacing any previous one.
    pub fn register(&mut self, channel: BoxChannel) {
        self.channels.insert(channel.name().to_string(), channel);
    }

    /// Deliver messages in order until the bus closes and drains.
    pub async fn run(&self) {
        while let Some(message) = self.bus.consume_outbound().await {
            let Some(channel) = self.channels.get(&message.channel) else {
                warn!(
                    error = %ChannelError::UnknownChannel(message.channel.clone()),
                    "outbound message dropped"
                );
                continue;
            };

            if let Err(e) = channel.send(&message).await {
                error!(
                    channel = %message.channel,
                    chat_id = %message.chat_id,
                    error = %e,
                    "outbound delivery failed"
                );
            }
        }
        debug!("outbound dispatcher stopped");
    }
}
