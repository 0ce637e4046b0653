//! Application state shared by the CLI commands.
//!
//! Pins the core services to the filesystem adapters in courier-infra.

use std::path::PathBuf;

use anyhow::Context;

use courier_core::session::SessionStore;
use courier_infra::config::{load_host_config, resolve_workspace};
use courier_infra::filesystem::{
    FileMemoryRepository, JsonlSessionRepository, memory_dir, resolve_data_dir, sessions_dir,
};
use courier_types::config::HostConfig;

/// Session store backed by JSONL files.
pub type ConcreteSessionStore = SessionStore<JsonlSessionRepository>;

/// Resolved paths, configuration, and storage adapters.
pub struct AppState {
    pub data_dir: PathBuf,
    pub workspace: PathBuf,
    pub config: HostConfig,
    pub sessions: ConcreteSessionStore,
    pub memory: FileMemoryRepository,
}

impl AppState {
    /// Resolve the data directory, load `config.toml`, and open storage.
    pub async fn init() -> anyhow::Result<Self> {
        Self::init_at(resolve_data_dir()).await
    }

    pub async fn init_at(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_host_config(&data_dir).await;
        let workspace = resolve_workspace(&config, &data_dir);

        Ok(Self {
            sessions: SessionStore::new(Self::session_repository(&data_dir)),
            memory: FileMemoryRepository::new(memory_dir(&workspace)),
            data_dir,
            workspace,
            config,
        })
    }

    /// A fresh repository over the session log directory.
    pub fn session_repository(data_dir: &std::path::Path) -> JsonlSessionRepository {
        JsonlSessionRepository::new(sessions_dir(data_dir))
    }
}
