//! Consolidation result types.

use serde::{Deserialize, Serialize};

/// Output of one consolidation call.
///
/// Either field may be absent when the summarizer produced nothing usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    /// Prose summary to append to the permanent history log.
    pub history_entry: Option<String>,
    /// Full replacement for the long-term memory text.
    pub memory_update: Option<String>,
}

impl ConsolidationResult {
    /// True when neither field was recovered.
    pub fn is_empty(&self) -> bool {
        self.history_entry.is_none() && self.memory_update.is_none()
    }
}
