//! Inbound and outbound message envelopes exchanged over the message bus.
//!
//! Channel adapters translate platform events into [`InboundMessage`]s and
//! deliver [`OutboundMessage`]s back to the platform.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::session_key;

/// Metadata key marking an outbound message as an in-progress update.
pub const PROGRESS_METADATA_KEY: &str = "progress";

/// A message received from a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    /// Channel name, e.g. "cli" or "telegram".
    pub channel: String,
    pub sender_id: String,
    /// Chat or thread identifier within the channel.
    pub chat_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Local paths of attachments downloaded by the adapter.
    #[serde(default)]
    pub media: Vec<PathBuf>,
    /// Channel-specific metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    /// Create an inbound message stamped with the current time.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            media: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Attach media paths.
    pub fn with_media(mut self, media: Vec<PathBuf>) -> Self {
        self.media = media;
        self
    }

    /// The conversation key this message belongs to (`channel:chat_id`).
    pub fn session_key(&self) -> String {
        session_key(&self.channel, &self.chat_id)
    }
}

/// A message to deliver through a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    /// Platform message id this replies to, when the adapter supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OutboundMessage {
    /// Create an outbound message for a channel and chat.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
            metadata: HashMap::new(),
        }
    }

    /// Build a reply addressed to the origin of an inbound message.
    pub fn reply_to(inbound: &InboundMessage, content: impl Into<String>) -> Self {
        Self::new(inbound.channel.clone(), inbound.chat_id.clone(), content)
    }

    /// Mark this message as a progress update rather than a final answer.
    pub fn as_progress(mut self) -> Self {
        self.metadata
            .insert(PROGRESS_METADATA_KEY.to_string(), serde_json::Value::Bool(true));
        self
    }

    /// Whether this message is a progress update.
    pub fn is_progress(&self) -> bool {
        self.metadata
            .get(PROGRESS_METADATA_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
