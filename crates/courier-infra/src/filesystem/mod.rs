//! Filesystem adapters for Courier.
//!
//! Implements the session log and memory repository ports from
//! `courier-core` on plain files, plus the data directory layout:
//!
//! ```text
//! {data_dir}/
//!   config.toml
//!   sessions/{sanitized key}.jsonl
//!   workspace/memory/MEMORY.md
//!   workspace/memory/HISTORY.md
//! ```

pub mod memory_files;
pub mod session_log;

use std::path::{Path, PathBuf};

pub use memory_files::FileMemoryRepository;
pub use session_log::JsonlSessionRepository;

/// Directory holding one JSONL log per conversation.
pub fn sessions_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

/// Directory holding `MEMORY.md` and `HISTORY.md`.
pub fn memory_dir(workspace: &Path) -> PathBuf {
    workspace.join("memory")
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `COURIER_DATA_DIR` environment variable
/// 2. `~/.courier`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("COURIER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".courier");
    }

    // Last resort: current directory
    PathBuf::from(".courier")
}

/// Replace `path` with `content` via a sibling temp file and a rename, so
/// readers never observe a half-written file.
pub(crate) async fn write_atomic(path: &Path, content: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}
