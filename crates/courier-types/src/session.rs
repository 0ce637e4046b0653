//! Conversation session types for Courier.
//!
//! A [`Session`] is the mutable conversational state for one conversation key
//! (`channel:chat_id`). Its durable form is a session log: one
//! [`SessionMetadata`] record followed by one [`ConversationEntry`] per line.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One turn of a conversation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    /// Free-form role, e.g. "user" or "assistant".
    pub role: String,
    pub content: String,
    /// RFC 3339 timestamp set at append time.
    pub timestamp: String,
    /// Tools invoked while producing this turn, in invocation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
}

impl ConversationEntry {
    /// Create an entry stamped with the current time.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: now_rfc3339(),
            tools_used: None,
        }
    }

    /// Attach the list of tools used for this turn. An empty list is dropped.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools_used = if tools.is_empty() { None } else { Some(tools) };
        self
    }
}

/// Marker for the `"type": "metadata"` field of the first log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataKind {
    Metadata,
}

/// First record of every session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(rename = "type")]
    pub kind: MetadataKind,
    pub key: String,
    pub created_at: String,
    pub last_consolidated: usize,
}

/// The mutable conversational state for one conversation key.
///
/// Invariant: `last_consolidated <= messages.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    pub messages: Vec<ConversationEntry>,
    /// Index of the first message not yet folded into long-term memory.
    pub last_consolidated: usize,
    /// When this conversation began. Survives trims, reset by clear.
    pub created_at: String,
}

impl Session {
    /// Create an empty session created now.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            messages: Vec::new(),
            last_consolidated: 0,
            created_at: now_rfc3339(),
        }
    }

    /// Rebuild a session from its durable records.
    ///
    /// `last_consolidated` is clamped to the number of loaded messages so a
    /// log with skipped lines still satisfies the session invariant.
    pub fn from_records(metadata: SessionMetadata, messages: Vec<ConversationEntry>) -> Self {
        let last_consolidated = metadata.last_consolidated.min(messages.len());
        Self {
            key: metadata.key,
            messages,
            last_consolidated,
            created_at: metadata.created_at,
        }
    }

    /// The metadata record describing this session.
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            kind: MetadataKind::Metadata,
            key: self.key.clone(),
            created_at: self.created_at.clone(),
            last_consolidated: self.last_consolidated,
        }
    }

    /// Messages not yet consolidated, up to (excluding) `end`.
    pub fn unconsolidated_until(&self, end: usize) -> &[ConversationEntry] {
        let end = end.min(self.messages.len());
        if self.last_consolidated >= end {
            return &[];
        }
        &self.messages[self.last_consolidated..end]
    }

    /// Keep `messages[cutoff..]` and reset the consolidation marker.
    ///
    /// `created_at` is left untouched.
    pub fn trim_before(&mut self, cutoff: usize) {
        let cutoff = cutoff.min(self.messages.len());
        self.messages.drain(..cutoff);
        self.last_consolidated = 0;
    }

    /// Reset to an empty conversation with a fresh `created_at`.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_consolidated = 0;
        self.created_at = now_rfc3339();
    }
}

/// Build the conversation key for a channel and chat.
pub fn session_key(channel: &str, chat_id: &str) -> String {
    format!("{channel}:{chat_id}")
}

/// Current time in the timestamp format used by session logs.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a session-log timestamp, if well formed.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(n: usize) -> Session {
        let mut s = Session::new("cli:direct");
        for i in 0..n {
            s.messages.push(ConversationEntry::new("user", format!("m{i}")));
        }
        s
    }

    #[test]
    fn test_entry_serializes_camel_case_and_skips_empty_tools() {
        let entry = ConversationEntry::new("assistant", "done");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("toolsUsed"));

        let entry = entry.with_tools(vec!["read_file".to_string()]);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"toolsUsed\":[\"read_file\"]"));
    }

    #[test]
    fn test_with_tools_empty_is_none() {
        let entry = ConversationEntry::new("assistant", "x").with_tools(Vec::new());
        assert!(entry.tools_used.is_none());
    }

    #[test]
    fn test_metadata_type_tag() {
        let s = Session::new("telegram:42");
        let json = serde_json::to_string(&s.metadata()).unwrap();
        assert!(json.contains("\"type\":\"metadata\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"lastConsolidated\":0"));
    }

    #[test]
    fn test_metadata_requires_type_field() {
        let json = r#"{"key":"a:b","createdAt":"2025-01-01T00:00:00Z","lastConsolidated":0}"#;
        assert!(serde_json::from_str::<SessionMetadata>(json).is_err());
    }

    #[test]
    fn test_trim_before_preserves_created_at() {
        let mut s = session_with(10);
        s.last_consolidated = 4;
        let created = s.created_at.clone();

        s.trim_before(6);

        assert_eq!(s.messages.len(), 4);
        assert_eq!(s.messages[0].content, "m6");
        assert_eq!(s.last_consolidated, 0);
        assert_eq!(s.created_at, created);
    }

    #[test]
    fn test_trim_before_past_end_empties() {
        let mut s = session_with(3);
        s.trim_before(10);
        assert!(s.messages.is_empty());
    }

    #[test]
    fn test_clear_resets_everything_but_key() {
        let mut s = session_with(3);
        s.created_at = "2020-01-01T00:00:00.000Z".to_string();
        s.last_consolidated = 2;

        s.clear();

        assert_eq!(s.key, "cli:direct");
        assert!(s.messages.is_empty());
        assert_eq!(s.last_consolidated, 0);
        assert_ne!(s.created_at, "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_unconsolidated_until() {
        let mut s = session_with(10);
        s.last_consolidated = 3;
        let batch = s.unconsolidated_until(7);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[0].content, "m3");

        s.last_consolidated = 8;
        assert!(s.unconsolidated_until(7).is_empty());
    }

    #[test]
    fn test_from_records_clamps_marker() {
        let meta = SessionMetadata {
            kind: MetadataKind::Metadata,
            key: "k".to_string(),
            created_at: now_rfc3339(),
            last_consolidated: 9,
        };
        let s = Session::from_records(meta, vec![ConversationEntry::new("user", "a")]);
        assert_eq!(s.last_consolidated, 1);
    }

    #[test]
    fn test_session_key_and_timestamp() {
        assert_eq!(session_key("telegram", "123"), "telegram:123");
        assert!(parse_timestamp(&now_rfc3339()).is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
