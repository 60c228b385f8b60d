//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Debounce window between the last edit and the autosave.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Literal marker the generator writes where a value is still missing.
pub const DEFAULT_SENTINEL: &str = "Value_to_be_filled";

/// Paths to all Medscribe data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// Generator configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.db)?;
        Ok(paths)
    }
}

/// Top-level Medscribe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedscribeConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Autosave debounce in milliseconds.
    pub debounce_ms: u64,
    /// Placeholder token addressed by field ordinals.
    pub sentinel: String,
}

impl MedscribeConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3010);

        let debounce_ms = std::env::var("MEDSCRIBE_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DEBOUNCE_MS);

        let sentinel = std::env::var("MEDSCRIBE_SENTINEL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SENTINEL.to_string());

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            debounce_ms,
            sentinel,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths_created() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        assert!(paths.db.is_dir());
        assert_eq!(paths.llm_config_file, dir.path().join("llm-config.json"));
    }

    #[test]
    fn test_debounce_duration() {
        let dir = tempfile::tempdir().unwrap();
        let config = MedscribeConfig {
            port: 3010,
            data_paths: DataPaths::new(dir.path()).unwrap(),
            debounce_ms: 1500,
            sentinel: DEFAULT_SENTINEL.to_string(),
        };
        assert_eq!(config.debounce(), Duration::from_millis(1500));
    }
}
