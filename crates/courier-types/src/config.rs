//! Host configuration types for Courier.
//!
//! `HostConfig` represents the top-level `config.toml` that controls models,
//! the session window, consolidation limits, and the execution engine command.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Courier host.
///
/// Loaded from `~/.courier/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Model used by the execution engine.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for consolidation summaries.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// Agent workspace (engine cwd, memory files). Defaults to `{data_dir}/workspace`.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Persona prepended to the long-term memory in every new engine handle.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum retained turns before consolidation triggers.
    #[serde(default = "default_session_window")]
    pub session_window: usize,

    /// Deadline for one summarization call.
    #[serde(default = "default_consolidation_timeout_secs")]
    pub consolidation_timeout_secs: u64,

    /// Memory size in bytes above which the summarizer is asked to compress.
    #[serde(default = "default_memory_compress_threshold")]
    pub memory_compress_threshold: usize,

    /// Number of trailing batch entries kept in a raw fallback history entry.
    #[serde(default = "default_fallback_entry_count")]
    pub fallback_entry_count: usize,

    /// Per-entry character cap in a raw fallback history entry.
    #[serde(default = "default_fallback_content_chars")]
    pub fallback_content_chars: usize,

    /// Publish tool invocations as progress messages.
    #[serde(default = "default_send_progress")]
    pub send_progress: bool,

    /// Execution engine subprocess settings.
    #[serde(default)]
    pub engine: EngineCommandConfig,
}

impl HostConfig {
    /// The consolidation deadline as a `Duration`.
    pub fn consolidation_timeout(&self) -> Duration {
        Duration::from_secs(self.consolidation_timeout_secs)
    }

    /// Number of turns kept after a trim (half the window, rounded down).
    pub fn keep_count(&self) -> usize {
        self.session_window / 2
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_summary_model() -> String {
    "claude-haiku-4-5".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful personal assistant reachable over several chat channels. \
     Be concise, and use the long-term memory below to stay consistent across conversations."
        .to_string()
}

fn default_session_window() -> usize {
    50
}

fn default_consolidation_timeout_secs() -> u64 {
    60
}

fn default_memory_compress_threshold() -> usize {
    8 * 1024
}

fn default_fallback_entry_count() -> usize {
    10
}

fn default_fallback_content_chars() -> usize {
    200
}

fn default_send_progress() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            summary_model: default_summary_model(),
            workspace: None,
            system_prompt: default_system_prompt(),
            session_window: default_session_window(),
            consolidation_timeout_secs: default_consolidation_timeout_secs(),
            memory_compress_threshold: default_memory_compress_threshold(),
            fallback_entry_count: default_fallback_entry_count(),
            fallback_content_chars: default_fallback_content_chars(),
            send_progress: default_send_progress(),
            engine: EngineCommandConfig::default(),
        }
    }
}

/// How to launch the execution engine subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCommandConfig {
    #[serde(default = "default_engine_command")]
    pub command: String,
    #[serde(default = "default_engine_args")]
    pub args: Vec<String>,
}

fn default_engine_command() -> String {
    "claude".to_string()
}

fn default_engine_args() -> Vec<String> {
    [
        "--print",
        "--verbose",
        "--input-format",
        "stream-json",
        "--output-format",
        "stream-json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for EngineCommandConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: default_engine_args(),
        }
    }
}
