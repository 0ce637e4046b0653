//! JSONL session log files.
//!
//! Format, one JSON object per line:
//! ```text
//! {"type":"metadata","key":"telegram:42","createdAt":"...","lastConsolidated":0}
//! {"role":"user","content":"hi","timestamp":"..."}
//! {"role":"assistant","content":"hello","timestamp":"...","toolsUsed":["web_search"]}
//! ```
//! Appends add one line. Trim and clear rewrite the file atomically.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use courier_core::session::SessionLogRepository;
use courier_types::error::RepositoryError;
use courier_types::session::{ConversationEntry, Session, SessionMetadata};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::write_atomic;

/// File-name-safe form of a conversation key (`telegram:42` -> `telegram_3A42`).
///
/// ASCII alphanumerics, `-` and `.` pass through. Every other byte, `_`
/// included, becomes `_` plus two hex digits, so distinct keys never share
/// a file.
pub fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}

/// Inverse of [`sanitize_key`]. `None` for names it could not have produced.
pub fn unsanitize_key(name: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(name.len());
    let mut rest = name.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'_' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

/// Parse a session log.
///
/// The metadata record is expected on the first non-empty line. When it is
/// missing or corrupt the session is rebuilt from `key` with a fresh
/// `created_at`. Corrupt entry lines are logged and skipped. A metadata
/// record naming a different key is ignored in favour of `key`.
pub fn parse_session_log(key: &str, content: &str) -> Session {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .peekable();

    let mut metadata = lines
        .peek()
        .and_then(|(_, first)| serde_json::from_str::<SessionMetadata>(first).ok());
    if metadata.is_some() {
        lines.next();
    } else {
        warn!(session_key = key, "session log has no metadata record, rebuilding it");
    }
    if let Some(found) = metadata.as_mut().filter(|m| m.key != key) {
        warn!(session_key = key, recorded_key = %found.key, "session log metadata names another key, using the requested one");
        found.key = key.to_string();
    }

    let mut messages = Vec::new();
    for (idx, line) in lines {
        match serde_json::from_str::<ConversationEntry>(line) {
            Ok(entry) => messages.push(entry),
            Err(e) => warn!(session_key = key, line = idx + 1, error = %e, "skipping corrupt session log line"),
        }
    }

    match metadata {
        Some(metadata) => Session::from_records(metadata, messages),
        None => {
            let mut session = Session::new(key);
            session.messages = messages;
            session
        }
    }
}

/// Serialize one record as a JSON line (with trailing newline).
fn json_line<T: serde::Serialize>(record: &T) -> Result<String, RepositoryError> {
    let mut line =
        serde_json::to_string(record).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Compose a complete session log: metadata record then every entry.
pub fn compose_session_log(session: &Session) -> Result<String, RepositoryError> {
    let mut out = json_line(&session.metadata())?;
    for entry in &session.messages {
        out.push_str(&json_line(entry)?);
    }
    Ok(out)
}

/// Session log repository over a directory of JSONL files.
#[derive(Debug, Clone)]
pub struct JsonlSessionRepository {
    dir: PathBuf,
}

impl JsonlSessionRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Log file path for a conversation key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize_key(key)))
    }

    async fn key_from_file(path: &Path) -> Option<String> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        let first = content.lines().find(|l| !l.trim().is_empty())?;
        serde_json::from_str::<SessionMetadata>(first)
            .ok()
            .map(|m| m.key)
    }
}

impl SessionLogRepository for JsonlSessionRepository {
    async fn load(&self, key: &str) -> Result<Option<Session>, RepositoryError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(parse_session_log(key, &content))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn append(
        &self,
        metadata: &SessionMetadata,
        entry: &ConversationEntry,
    ) -> Result<(), RepositoryError> {
        let path = self.path_for(&metadata.key);
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut payload = String::new();
        if !tokio::fs::try_exists(&path).await? {
            payload.push_str(&json_line(metadata)?);
        }
        payload.push_str(&json_line(entry)?);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn rewrite(&self, session: &Session) -> Result<(), RepositoryError> {
        let path = self.path_for(&session.key);
        write_atomic(&path, &compose_session_log(session)?).await?;
        debug!(session_key = %session.key, messages = session.messages.len(), "session log rewritten");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, RepositoryError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            match Self::key_from_file(&path).await {
                Some(key) => keys.push(key),
                None => {
                    if let Some(key) = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(unsanitize_key)
                    {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
