//! Execution engine request and event types.
//!
//! The execution engine is the stateful agent runtime that actually answers a
//! turn (tool use, prompt construction, streaming completion). Courier only
//! sees these shapes: options for opening a handle, the input for a turn, and
//! the closed set of events streamed back.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options for opening a long-lived engine handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub model: String,
    /// Working directory the agent operates in.
    pub cwd: PathBuf,
    pub system_prompt: String,
}

/// An inline binary attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type, e.g. "image/png".
    pub media_type: String,
    pub data: Vec<u8>,
}

/// Input for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineInput {
    Text(String),
    MultiPart {
        text: String,
        attachments: Vec<Attachment>,
    },
}

impl EngineInput {
    /// Build plain text input, or multi-part input when attachments exist.
    pub fn with_attachments(text: String, attachments: Vec<Attachment>) -> Self {
        if attachments.is_empty() {
            EngineInput::Text(text)
        } else {
            EngineInput::MultiPart { text, attachments }
        }
    }

    /// The text portion of the input.
    pub fn text(&self) -> &str {
        match self {
            EngineInput::Text(text) => text,
            EngineInput::MultiPart { text, .. } => text,
        }
    }
}

/// Token usage reported with the final result of a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Events streamed back by the engine for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine session is initialized.
    SystemInit {
        session_id: String,
        model: Option<String>,
    },

    /// A chunk of assistant text.
    AssistantPartial { text: String },

    /// The agent invoked a tool.
    ToolInvocation {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// A tool returned.
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },

    /// Terminal event carrying the complete response text.
    Final {
        text: String,
        usage: EngineUsage,
        is_error: bool,
    },
}

impl EngineEvent {
    /// Whether this event ends the turn.
    pub fn is_final(&self) -> bool {
        matches!(self, EngineEvent::Final { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_attachments_picks_variant() {
        let plain = EngineInput::with_attachments("hi".to_string(), Vec::new());
        assert!(matches!(plain, EngineInput::Text(_)));

        let multi = EngineInput::with_attachments(
            "look".to_string(),
            vec![Attachment {
                media_type: "image/png".to_string(),
                data: vec![1, 2, 3],
            }],
        );
        assert!(matches!(multi, EngineInput::MultiPart { .. }));
        assert_eq!(multi.text(), "look");
    }

    #[test]
    fn test_event_serde_tag() {
        let event = EngineEvent::Final {
            text: "done".to_string(),
            usage: EngineUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
            is_error: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"final\""));
        assert!(event.is_final());
    }
}
