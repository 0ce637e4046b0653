//! Memory CLI commands: show the long-term memory and the history log.

use anyhow::Result;
use console::style;

use courier_core::memory::MemoryRepository;

use crate::state::AppState;

/// Split HISTORY.md into its entries (blank-line separated).
fn history_entries(history: &str) -> Vec<&str> {
    history
        .split("\n\n")
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect()
}

/// Print MEMORY.md.
pub async fn show_memory(state: &AppState, json: bool) -> Result<()> {
    let memory = state.memory.read_memory().await?;

    if json {
        let out = serde_json::json!({
            "path": state.memory.memory_path(),
            "memory": memory,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if memory.trim().is_empty() {
        println!();
        println!(
            "  {} Long-term memory is empty. It fills in as conversations are consolidated.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    println!();
    println!(
        "  {}",
        style(state.memory.memory_path().display()).dim()
    );
    println!();
    println!("{}", memory.trim_end());
    println!();
    Ok(())
}

/// Print HISTORY.md, optionally only the last `last` entries.
pub async fn show_history(state: &AppState, last: Option<usize>, json: bool) -> Result<()> {
    let history = state.memory.read_history().await?;
    let entries = history_entries(&history);
    let skip = last.map_or(0, |n| entries.len().saturating_sub(n));
    let shown = &entries[skip..];

    if json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!();
        println!("  {} No history entries yet.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    for entry in shown {
        let raw = entry.contains("[RAW]");
        let mut lines = entry.lines();
        if let Some(first) = lines.next() {
            if raw {
                println!("  {}", style(first).yellow());
            } else {
                println!("  {first}");
            }
        }
        for line in lines {
            println!("  {}", style(line).dim());
        }
        println!();
    }
    println!(
        "  {} of {} entries",
        style(shown.len()).bold(),
        entries.len()
    );
    println!();
    Ok(())
}
