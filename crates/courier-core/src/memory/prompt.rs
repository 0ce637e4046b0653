//! Prompt construction for consolidation and the raw fallback entry.

use courier_types::session::{ConversationEntry, now_rfc3339};

/// System prompt for the consolidation LLM call.
pub const CONSOLIDATION_SYSTEM_PROMPT: &str = r#"You are a memory consolidation agent. You fold older conversation turns into two documents:

1. "history_entry": a short paragraph (2-5 sentences) summarizing what happened in these turns, starting with the time range in brackets. It is appended to a permanent, grep-searchable log, so include names, decisions, and concrete details.
2. "memory_update": the complete, updated long-term memory document. Merge new durable facts (preferences, identities, ongoing projects, commitments) into the existing memory. Keep everything still relevant. If nothing changes, return the existing memory unchanged.

Respond with a single JSON object with exactly these two string fields and nothing else."#;

const COMPRESSION_INSTRUCTION: &str = "The current memory is getting long. While merging, compress it: \
deduplicate, drop stale or superseded details, and keep only what will matter in future conversations.";

/// Render one turn as `[YYYY-MM-DDTHH:MM] ROLE [tools: a, b]: content`.
pub fn format_entry(entry: &ConversationEntry) -> String {
    let stamp = minute_stamp(&entry.timestamp);
    let role = entry.role.to_uppercase();
    match entry.tools_used.as_deref() {
        Some(tools) if !tools.is_empty() => {
            format!("[{stamp}] {role} [tools: {}]: {}", tools.join(", "), entry.content)
        }
        _ => format!("[{stamp}] {role}: {}", entry.content),
    }
}

/// Render a batch of turns one per line.
pub fn format_entries(entries: &[ConversationEntry]) -> String {
    entries
        .iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the user prompt for a consolidation call.
///
/// `compress` appends an instruction to shrink the memory document.
pub fn build_consolidation_prompt(
    entries: &[ConversationEntry],
    current_memory: &str,
    compress: bool,
) -> String {
    let memory = if current_memory.trim().is_empty() {
        "(empty)"
    } else {
        current_memory
    };

    let mut prompt = format!(
        "## Current long-term memory\n{memory}\n\n## Conversation to process\n{}\n",
        format_entries(entries)
    );
    if compress {
        prompt.push('\n');
        prompt.push_str(COMPRESSION_INSTRUCTION);
        prompt.push('\n');
    }
    prompt
}

/// Build the raw history entry written when consolidation fails.
///
/// Keeps the last `max_entries` turns of the batch with each content
/// truncated to `max_chars` characters, so nothing is dropped silently.
pub fn build_fallback_entry(
    entries: &[ConversationEntry],
    max_entries: usize,
    max_chars: usize,
) -> String {
    let tail = &entries[entries.len().saturating_sub(max_entries)..];
    let mut out = format!(
        "[{}] [RAW] consolidation unavailable; last {} of {} messages archived verbatim",
        minute_stamp(&now_rfc3339()),
        tail.len(),
        entries.len()
    );
    for entry in tail {
        let truncated = ConversationEntry {
            content: truncate_chars(&entry.content, max_chars),
            ..entry.clone()
        };
        out.push('\n');
        out.push_str(&format_entry(&truncated));
    }
    out
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn minute_stamp(timestamp: &str) -> String {
    timestamp.chars().take(16).collect()
}
