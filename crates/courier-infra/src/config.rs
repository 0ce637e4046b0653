//! Host configuration loader for Courier.
//!
//! Reads `config.toml` from the data directory (`~/.courier/` in production)
//! and deserializes it into [`HostConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use courier_types::config::HostConfig;

/// Load host configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`HostConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_host_config(data_dir: &Path) -> HostConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return HostConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return HostConfig::default();
        }
    };

    match toml::from_str::<HostConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            HostConfig::default()
        }
    }
}

/// Resolve the agent workspace directory.
///
/// An explicit `workspace` in config wins; otherwise `{data_dir}/workspace`.
/// A relative configured path is taken relative to the data directory.
pub fn resolve_workspace(config: &HostConfig, data_dir: &Path) -> PathBuf {
    match &config.workspace {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => data_dir.join(path),
        None => data_dir.join("workspace"),
    }
}
