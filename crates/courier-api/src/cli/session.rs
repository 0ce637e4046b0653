//! Session CLI commands: list, show, clear.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use courier_types::session::{Session, parse_timestamp};

use crate::state::AppState;

/// Render an RFC 3339 timestamp as local-agnostic `YYYY-MM-DD HH:MM`.
fn display_time(value: &str) -> String {
    parse_timestamp(value)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| value.to_string())
}

/// First line of `content`, cut to `max` characters.
fn preview(content: &str, max: usize) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

fn summary_json(session: &Session) -> serde_json::Value {
    serde_json::json!({
        "key": session.key,
        "messages": session.messages.len(),
        "unconsolidated": session.messages.len() - session.last_consolidated,
        "createdAt": session.created_at,
        "lastActivity": session.messages.last().map(|m| m.timestamp.as_str()),
    })
}

/// List every stored session.
///
/// ```bash
/// courier session list
/// courier session list --json
/// ```
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let keys = state.sessions.list_keys().await?;
    let mut sessions = Vec::with_capacity(keys.len());
    for key in &keys {
        sessions.push(state.sessions.get(key).await?);
    }

    if json {
        let rows: Vec<_> = sessions.iter().map(summary_json).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions yet. Start one with: {}",
            style("i").blue().bold(),
            style("courier run").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Started").fg(Color::White),
        Cell::new("Last activity").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Unconsolidated").fg(Color::White),
    ]);

    for session in &sessions {
        let last = session
            .messages
            .last()
            .map(|m| display_time(&m.timestamp))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&session.key).fg(Color::Cyan),
            Cell::new(display_time(&session.created_at)).fg(Color::White),
            Cell::new(last).fg(Color::DarkGrey),
            Cell::new(session.messages.len().to_string()).fg(Color::White),
            Cell::new((session.messages.len() - session.last_consolidated).to_string())
                .fg(Color::Yellow),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// Show the retained messages of one session.
pub async fn show_session(state: &AppState, key: &str, json: bool) -> Result<()> {
    let session = state.sessions.get(key).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    if session.messages.is_empty() {
        println!();
        println!("  {} Session '{}' is empty.", style("i").blue().bold(), style(key).cyan());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Time").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("Content").fg(Color::White),
        Cell::new("Tools").fg(Color::White),
    ]);

    for (idx, entry) in session.messages.iter().enumerate() {
        let role_color = if entry.role == "user" { Color::Green } else { Color::Blue };
        let index_cell = if idx < session.last_consolidated {
            Cell::new(idx.to_string()).fg(Color::DarkGrey)
        } else {
            Cell::new(idx.to_string()).fg(Color::White)
        };
        table.add_row(vec![
            index_cell,
            Cell::new(display_time(&entry.timestamp)).fg(Color::DarkGrey),
            Cell::new(&entry.role).fg(role_color),
            Cell::new(preview(&entry.content, 80)),
            Cell::new(entry.tools_used.as_deref().unwrap_or_default().join(", "))
                .fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!(
        "  Session '{}' (started {})",
        style(&session.key).cyan().bold(),
        display_time(&session.created_at)
    );
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} messages, {} consolidated",
        style(session.messages.len()).bold(),
        session.last_consolidated
    );
    println!();
    Ok(())
}

/// Clear a session after confirmation.
pub async fn clear_session(state: &AppState, key: &str, force: bool, json: bool) -> Result<()> {
    let count = state.sessions.message_count(key).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Clear {count} message(s) from '{key}'? They will not be consolidated"
            ))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state
        .sessions
        .clear(key)
        .await
        .with_context(|| format!("failed to clear session '{key}'"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "key": key, "cleared": count }))?
        );
    } else {
        println!();
        println!(
            "  {} Cleared {} message(s) from '{}'",
            style("✓").green().bold(),
            count,
            style(key).cyan()
        );
        println!();
    }
    Ok(())
}
