//! Configuration loading for the indexing engine.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/sn-index/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::IndexDataError;

const APP_NAME: &str = "sn-index";

/// Settings of the index manager and its commit worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingSettings {
    /// Directory of the native index
    #[serde(default = "default_index_directory")]
    pub index_directory: String,

    /// Parent directory of timestamped backups
    #[serde(default = "default_backup_directory")]
    pub backup_directory: String,

    /// Commit worker tick interval (ms)
    #[serde(default = "default_commit_delay_ms")]
    pub commit_delay_ms: u64,

    /// Busy ticks tolerated before a delayed commit is forced.
    #[serde(default = "default_delayed_commit_cycle_max_count")]
    pub delayed_commit_cycle_max_count: u32,

    /// How long a write waits behind a paused engine before failing.
    #[serde(default = "default_indexing_paused_timeout_secs")]
    pub indexing_paused_timeout_secs: u64,

    /// Maximum reader age before a reader frame forces a reopen.
    #[serde(default = "default_force_reopen_frequency_secs")]
    pub force_reopen_frequency_secs: u64,

    /// Memory budget of the native writer (MB)
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,

    /// Node types skipped by subtree indexing
    #[serde(default)]
    pub excluded_node_types: Vec<String>,
}

fn data_dir(name: &str) -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().join(name))
        .unwrap_or_else(|| PathBuf::from(".").join(name))
        .to_string_lossy()
        .to_string()
}

fn default_index_directory() -> String {
    data_dir("index")
}

fn default_backup_directory() -> String {
    data_dir("backup")
}

fn default_commit_delay_ms() -> u64 {
    1000
}

fn default_delayed_commit_cycle_max_count() -> u32 {
    10
}

fn default_indexing_paused_timeout_secs() -> u64 {
    60
}

fn default_force_reopen_frequency_secs() -> u64 {
    30
}

fn default_writer_memory_mb() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            index_directory: default_index_directory(),
            backup_directory: default_backup_directory(),
            commit_delay_ms: default_commit_delay_ms(),
            delayed_commit_cycle_max_count: default_delayed_commit_cycle_max_count(),
            indexing_paused_timeout_secs: default_indexing_paused_timeout_secs(),
            force_reopen_frequency_secs: default_force_reopen_frequency_secs(),
            writer_memory_mb: default_writer_memory_mb(),
            excluded_node_types: Vec::new(),
        }
    }
}

impl IndexingSettings {
    /// Settings rooted at a given index directory, everything else default.
    pub fn for_directory(index_directory: impl Into<PathBuf>) -> Self {
        let index_directory: PathBuf = index_directory.into();
        let backup_directory = index_directory
            .parent()
            .map(|p| p.join("backup"))
            .unwrap_or_else(|| PathBuf::from("backup"));
        Self {
            index_directory: index_directory.to_string_lossy().to_string(),
            backup_directory: backup_directory.to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), IndexDataError> {
        if self.commit_delay_ms == 0 {
            return Err(IndexDataError::Config("commit_delay_ms must be > 0".to_string()));
        }
        if self.delayed_commit_cycle_max_count == 0 {
            return Err(IndexDataError::Config(
                "delayed_commit_cycle_max_count must be > 0".to_string(),
            ));
        }
        if self.indexing_paused_timeout_secs == 0 {
            return Err(IndexDataError::Config(
                "indexing_paused_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.force_reopen_frequency_secs == 0 {
            return Err(IndexDataError::Config(
                "force_reopen_frequency_secs must be > 0".to_string(),
            ));
        }
        if self.writer_memory_mb == 0 {
            return Err(IndexDataError::Config("writer_memory_mb must be > 0".to_string()));
        }
        if self.index_directory.trim().is_empty() {
            return Err(IndexDataError::Config("index_directory is empty".to_string()));
        }
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf {
        expand_home(&self.index_directory)
    }

    pub fn backup_path(&self) -> PathBuf {
        expand_home(&self.backup_directory)
    }

    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    pub fn indexing_paused_timeout(&self) -> Duration {
        Duration::from_secs(self.indexing_paused_timeout_secs)
    }

    pub fn force_reopen_frequency(&self) -> Duration {
        Duration::from_secs(self.force_reopen_frequency_secs)
    }

    pub fn writer_memory_bytes(&self) -> usize {
        self.writer_memory_mb * 1024 * 1024
    }

    /// Whether subtree indexing skips nodes of this type (case-insensitive).
    pub fn is_excluded_node_type(&self, node_type: &str) -> bool {
        self.excluded_node_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(node_type))
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub indexing: IndexingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            indexing: IndexingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/sn-index/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SNINDEX_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, IndexDataError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(config_error)?
            .set_default("indexing.index_directory", default_index_directory())
            .map_err(config_error)?
            .set_default("indexing.backup_directory", default_backup_directory())
            .map_err(config_error)?
            .set_default("indexing.commit_delay_ms", default_commit_delay_ms() as i64)
            .map_err(config_error)?
            .set_default(
                "indexing.delayed_commit_cycle_max_count",
                default_delayed_commit_cycle_max_count() as i64,
            )
            .map_err(config_error)?
            .set_default(
                "indexing.indexing_paused_timeout_secs",
                default_indexing_paused_timeout_secs() as i64,
            )
            .map_err(config_error)?
            .set_default(
                "indexing.force_reopen_frequency_secs",
                default_force_reopen_frequency_secs() as i64,
            )
            .map_err(config_error)?
            .set_default("indexing.writer_memory_mb", default_writer_memory_mb() as i64)
            .map_err(config_error)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: SNINDEX_LOG_LEVEL, SNINDEX_INDEXING__COMMIT_DELAY_MS, etc.
        builder = builder.add_source(
            Environment::with_prefix("SNINDEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        settings.indexing.validate()?;
        Ok(settings)
    }
}

fn config_error(e: config::ConfigError) -> IndexDataError {
    IndexDataError::Config(e.to_string())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.indexing.commit_delay_ms, 1000);
        assert_eq!(settings.indexing.delayed_commit_cycle_max_count, 10);
        assert_eq!(settings.indexing.indexing_paused_timeout(), Duration::from_secs(60));
        assert_eq!(settings.indexing.force_reopen_frequency(), Duration::from_secs(30));
        assert_eq!(settings.indexing.writer_memory_bytes(), 50 * 1024 * 1024);
        assert!(settings.indexing.excluded_node_types.is_empty());
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.indexing.commit_delay_ms, 1000);
        assert!(settings.indexing.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("sn-index-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("indexd.toml");
        std::fs::write(
            &path,
            "log_level = \"debug\"\n[indexing]\ncommit_delay_ms = 250\nexcluded_node_types = [\"SystemFolder\"]\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.indexing.commit_delay_ms, 250);
        assert_eq!(settings.indexing.delayed_commit_cycle_max_count, 10);
        assert!(settings.indexing.is_excluded_node_type("systemfolder"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_validation() {
        let mut settings = IndexingSettings::default();
        assert!(settings.validate().is_ok());

        settings.commit_delay_ms = 0;
        assert!(matches!(settings.validate(), Err(IndexDataError::Config(_))));

        settings.commit_delay_ms = 10;
        settings.writer_memory_mb = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_for_directory() {
        let settings = IndexingSettings::for_directory("/tmp/idx/index");
        assert_eq!(settings.index_path(), PathBuf::from("/tmp/idx/index"));
        assert_eq!(settings.backup_path(), PathBuf::from("/tmp/idx/backup"));
    }

    #[test]
    fn test_expand_home() {
        let path = expand_home("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }
}
