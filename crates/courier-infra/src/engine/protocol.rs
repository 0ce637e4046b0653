//! Line-delimited JSON protocol spoken by the agent CLI.
//!
//! Input, one line per user turn:
//! ```text
//! {"type":"user","message":{"role":"user","content":[{"type":"text","text":"hi"}]}}
//! ```
//! Output lines are tagged by `type`: `system` (subtype `init`), `assistant`
//! (text and `tool_use` blocks), `user` (`tool_result` blocks), and `result`
//! which ends the turn. Anything else is ignored.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use courier_types::engine::{EngineEvent, EngineInput, EngineUsage};
use courier_types::error::EngineError;

#[derive(Debug, Serialize)]
struct UserLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: UserPayload<'a>,
}

#[derive(Debug, Serialize)]
struct UserPayload<'a> {
    role: &'static str,
    content: Vec<InputBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: String,
}

/// Encode one user turn as a JSON line (without the trailing newline).
pub fn encode_input(input: &EngineInput) -> Result<String, EngineError> {
    let mut content = Vec::new();
    match input {
        EngineInput::Text(text) => content.push(InputBlock::Text { text }),
        EngineInput::MultiPart { text, attachments } => {
            for attachment in attachments {
                content.push(InputBlock::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: &attachment.media_type,
                        data: STANDARD.encode(&attachment.data),
                    },
                });
            }
            content.push(InputBlock::Text { text });
        }
    }

    let line = UserLine {
        kind: "user",
        message: UserPayload {
            role: "user",
            content,
        },
    };
    serde_json::to_string(&line).map_err(|e| EngineError::Protocol(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputLine {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Assistant {
        message: OutputMessage,
    },
    User {
        message: OutputMessage,
    },
    #[serde(rename = "result")]
    TurnResult {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        usage: Option<EngineUsage>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<OutputBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

/// Tool results carry either a string or a list of text blocks.
fn tool_result_text(content: serde_json::Value) -> String {
    match content {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Decode one output line into zero or more events.
pub fn decode_line(line: &str) -> Result<Vec<EngineEvent>, EngineError> {
    let parsed: OutputLine =
        serde_json::from_str(line).map_err(|e| EngineError::Protocol(e.to_string()))?;

    let events = match parsed {
        OutputLine::System {
            subtype,
            session_id,
            model,
        } => match (subtype.as_deref(), session_id) {
            (Some("init"), Some(session_id)) => vec![EngineEvent::SystemInit { session_id, model }],
            _ => Vec::new(),
        },
        OutputLine::Assistant { message } => message
            .content
            .into_iter()
            .filter_map(|block| match block {
                OutputBlock::Text { text } if !text.is_empty() => {
                    Some(EngineEvent::AssistantPartial { text })
                }
                OutputBlock::ToolUse { id, name, input } => {
                    Some(EngineEvent::ToolInvocation { id, name, input })
                }
                _ => None,
            })
            .collect(),
        OutputLine::User { message } => message
            .content
            .into_iter()
            .filter_map(|block| match block {
                OutputBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some(EngineEvent::ToolResult {
                    tool_use_id,
                    content: tool_result_text(content),
                    is_error,
                }),
                _ => None,
            })
            .collect(),
        OutputLine::TurnResult {
            subtype,
            is_error,
            result,
            usage,
        } => {
            let text = match (result, is_error) {
                (Some(text), _) => text,
                (None, true) => subtype.unwrap_or_else(|| "error".to_string()),
                (None, false) => String::new(),
            };
            vec![EngineEvent::Final {
                text,
                usage: usage.unwrap_or_default(),
                is_error,
            }]
        }
        OutputLine::Unknown => Vec::new(),
    };
    Ok(events)
}
