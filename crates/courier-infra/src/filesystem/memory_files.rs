//! `MEMORY.md` and `HISTORY.md` in the workspace memory directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use courier_core::memory::MemoryRepository;
use courier_types::error::RepositoryError;
use tokio::io::AsyncWriteExt;

use super::write_atomic;

pub const MEMORY_FILE: &str = "MEMORY.md";
pub const HISTORY_FILE: &str = "HISTORY.md";

/// Memory repository over two Markdown files.
#[derive(Debug, Clone)]
pub struct FileMemoryRepository {
    dir: PathBuf,
}

impl FileMemoryRepository {
    /// `dir` is the memory directory, usually `{workspace}/memory`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn memory_path(&self) -> PathBuf {
        self.dir.join(MEMORY_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }
}

async fn read_or_empty(path: &Path) -> Result<String, RepositoryError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

impl MemoryRepository for FileMemoryRepository {
    async fn read_memory(&self) -> Result<String, RepositoryError> {
        read_or_empty(&self.memory_path()).await
    }

    async fn write_memory(&self, content: &str) -> Result<(), RepositoryError> {
        write_atomic(&self.memory_path(), content).await?;
        Ok(())
    }

    async fn append_history(&self, entry: &str) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path())
            .await?;
        file.write_all(format!("{}\n\n", entry.trim_end()).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_history(&self) -> Result<String, RepositoryError> {
        read_or_empty(&self.history_path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = tempdir().unwrap();
        let repo = FileMemoryRepository::new(dir.path().join("memory"));
        assert_eq!(repo.read_memory().await.unwrap(), "");
        assert_eq!(repo.read_history().await.unwrap(), "");
    }

    #[tokio::test]
    async fn memory_is_replaced_in_full() {
        let dir = tempdir().unwrap();
        let repo = FileMemoryRepository::new(dir.path().join("memory"));
        repo.write_memory("# Facts\n- likes tea\n").await.unwrap();
        repo.write_memory("# Facts\n- likes coffee\n").await.unwrap();
        assert_eq!(repo.read_memory().await.unwrap(), "# Facts\n- likes coffee\n");
    }

    #[tokio::test]
    async fn history_entries_are_blank_line_separated() {
        let dir = tempdir().unwrap();
        let repo = FileMemoryRepository::new(dir.path().join("memory"));
        repo.append_history("[2026-01-01 10:00] First.").await.unwrap();
        repo.append_history("[2026-01-02 11:00] Second.\n").await.unwrap();

        assert_eq!(
            repo.read_history().await.unwrap(),
            "[2026-01-01 10:00] First.\n\n[2026-01-02 11:00] Second.\n\n"
        );
        assert!(repo.history_path().ends_with("memory/HISTORY.md"));
    }
}
