//! Terminal channel: stdin lines in, styled replies out.

use std::sync::Arc;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use courier_core::channel::Channel;
use courier_core::message::MessageBus;
use courier_types::error::ChannelError;
use courier_types::message::{InboundMessage, OutboundMessage};

pub const CHANNEL_NAME: &str = "cli";
pub const CHAT_ID: &str = "direct";
const SENDER_ID: &str = "user";

/// Prints outbound messages to stdout.
#[derive(Debug, Clone, Default)]
pub struct CliChannel {
    json: bool,
}

impl CliChannel {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Render one outbound message as it should appear in the terminal.
    pub fn render(&self, message: &OutboundMessage) -> Result<String, ChannelError> {
        if self.json {
            return serde_json::to_string(message).map_err(|e| ChannelError::Delivery(e.to_string()));
        }
        Ok(if message.is_progress() {
            format!("  {} {}", style("~").dim(), style(&message.content).dim())
        } else {
            format!("\n{}\n", message.content.trim_end())
        })
    }
}

impl Channel for CliChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        println!("{}", self.render(message)?);
        Ok(())
    }
}

/// Turn one stdin line into an inbound message. Blank lines are ignored.
pub fn inbound_from_line(line: &str) -> Option<InboundMessage> {
    let content = line.trim();
    if content.is_empty() {
        return None;
    }
    Some(InboundMessage::new(CHANNEL_NAME, SENDER_ID, CHAT_ID, content))
}

/// Publish stdin lines to the bus until EOF.
pub async fn read_stdin(bus: Arc<MessageBus>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(message) = inbound_from_line(&line) {
            bus.publish_inbound(message);
        }
    }
    debug!("stdin closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_become_direct_messages() {
        let msg = inbound_from_line("  hello there \n").unwrap();
        assert_eq!(msg.session_key(), "cli:direct");
        assert_eq!(msg.content, "hello there");
        assert!(inbound_from_line("   ").is_none());
    }

    #[test]
    fn json_rendering_is_one_line() {
        let channel = CliChannel::new(true);
        let out = OutboundMessage::new(CHANNEL_NAME, CHAT_ID, "multi\nline");
        let rendered = channel.render(&out).unwrap();
        assert!(!rendered.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(json["content"], "multi\nline");
    }

    #[test]
    fn progress_is_rendered_inline() {
        let channel = CliChannel::new(false);
        let progress = OutboundMessage::new(CHANNEL_NAME, CHAT_ID, "Read(\"a.rs\")").as_progress();
        let rendered = channel.render(&progress).unwrap();
        assert!(rendered.contains("Read(\"a.rs\")"));
        assert!(!rendered.starts_with('\n'));

        let reply = OutboundMessage::new(CHANNEL_NAME, CHAT_ID, "done\n");
        assert_eq!(channel.render(&reply).unwrap(), "\ndone\n");
    }
}
