//! Sliding-window arithmetic and recap rendering.

use courier_types::session::ConversationEntry;

/// Where to cut an overflowing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPlan {
    /// First index of the batch still to consolidate.
    pub start: usize,
    /// Messages before this index are consolidated and trimmed.
    pub cutoff: usize,
}

/// Plan a trim when `count` exceeds `window`, keeping `window / 2` turns.
pub fn plan_trim(count: usize, last_consolidated: usize, window: usize) -> Option<TrimPlan> {
    if count <= window {
        return None;
    }
    let keep = window / 2;
    let cutoff = count - keep;
    Some(TrimPlan {
        start: last_consolidated.min(cutoff),
        cutoff,
    })
}

/// Render retained turns as `role: content`, one per line.
pub fn build_recap(entries: &[ConversationEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.role, e.content))
        .collect::<Vec<_>>()
        .join("\n")
}
