//! Channel adapter port.
//!
//! A channel owns one transport. Its inbound half publishes to the
//! [`MessageBus`](crate::message::MessageBus); its outbound half is the
//! `send` method the outbound dispatcher calls.

use std::future::Future;
use std::pin::Pin;

use courier_types::error::ChannelError;
use courier_types::message::OutboundMessage;

/// Trait for transport adapters (CLI, chat platforms, ...).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait Channel: Send + Sync {
    /// Channel name, matching `OutboundMessage::channel`.
    fn name(&self) -> &str;

    /// Deliver one outbound message.
    fn send(
        &self,
        message: &OutboundMessage,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Object-safe version of [`Channel`] with boxed futures.
pub trait ChannelDyn: Send + Sync {
    fn name(&self) -> &str;

    fn send_boxed<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + 'a>>;
}

impl<T: Channel> ChannelDyn for T {
    fn name(&self) -> &str {
        Channel::name(self)
    }

    fn send_boxed<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + 'a>> {
        Box::pin(self.send(message))
    }
}

/// Type-erased channel so adapters of different types share one registry.
pub struct BoxChannel {
    inner: Box<dyn ChannelDyn>,
}

impl BoxChannel {
    pub fn new<T: Channel + 'static>(channel: T) -> Self {
        Self {
            inner: Box::new(channel),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        self.inner.send_boxed(message).await
    }
}

impl std::fmt::Debug for BoxChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxChannel").field("name", &self.name()).finish()
    }
}
