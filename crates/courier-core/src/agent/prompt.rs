//! Prompt assembly for engine handles.
//!
//! Sections are wrapped in XML tags so the model can tell the persona,
//! the long-term memory, and the recap apart.

/// System prompt for a freshly opened engine handle.
///
/// Layout:
/// ```text
/// <persona>{persona}</persona>
/// <long_term_memory>{memory}</long_term_memory>
/// ```
/// The memory section is omitted when memory is empty.
pub fn compose_system_prompt(persona: &str, memory: &str) -> String {
    let mut sections = Vec::with_capacity(2);
    if !persona.trim().is_empty() {
        sections.push(format!("<persona>\n{}\n</persona>", persona.trim()));
    }
    if !memory.trim().is_empty() {
        sections.push(format!(
            "<long_term_memory>\n{}\n</long_term_memory>",
            memory.trim()
        ));
    }
    sections.join("\n\n")
}

/// Prefix a user turn with the recap of the conversation so far.
pub fn compose_recap_turn(recap: &str, text: &str) -> String {
    format!(
        "<recap>\nThe conversation so far (older turns were archived to memory):\n{recap}\n</recap>\n\n{text}"
    )
}

/// One-line description of a tool call for progress messages,
/// e.g. `web_search("rust async")`.
pub fn tool_hint(name: &str, input: &serde_json::Value) -> String {
    let first_arg = input
        .as_object()
        .and_then(|map| map.values().find_map(|v| v.as_str()));
    match first_arg {
        Some(arg) => {
            let short: String = arg.chars().take(40).collect();
            if short.len() < arg.len() {
                format!("{name}(\"{short}...\")")
            } else {
                format!("{name}(\"{short}\")")
            }
        }
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn system_prompt_with_and_without_memory() {
        assert_eq!(compose_system_prompt("Be kind.", ""), "<persona>\nBe kind.\n</persona>");

        let full = compose_system_prompt("Be kind.", "User is Ada.\n");
        assert!(full.starts_with("<persona>"));
        assert!(full.ends_with("<long_term_memory>\nUser is Ada.\n</long_term_memory>"));
    }

    #[test]
    fn recap_turn_keeps_user_text_last() {
        let turn = compose_recap_turn("user: hi", "what next?");
        assert!(turn.contains("user: hi"));
        assert!(turn.ends_with("\n\nwhat next?"));
    }

    #[test]
    fn tool_hints() {
        assert_eq!(tool_hint("read", &json!({"path": "a.txt"})), "read(\"a.txt\")");
        assert_eq!(tool_hint("list", &json!({})), "list");
        let long = "x".repeat(60);
        assert_eq!(
            tool_hint("grep", &json!({"pattern": long})),
            format!("grep(\"{}...\")", "x".repeat(40))
        );
    }
}
