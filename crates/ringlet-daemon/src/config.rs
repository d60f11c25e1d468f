//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Repository service settings.
    #[serde(default)]
    pub pds: PdsSection,
    /// Sync settings.
    #[serde(default)]
    pub sync: SyncSection,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Repository service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdsSection {
    /// Base URL of the repository service all actors live behind.
    #[serde(default = "default_service_url")]
    pub service_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Page size for record listings.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Minimum seconds between manually-triggered full sync passes.
    #[serde(default = "default_sync_interval")]
    pub min_interval_secs: u64,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_service_url() -> String {
    "https://pds.ringlet.net".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_page_size() -> u32 {
    100
}

fn default_sync_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
        }
    }
}

impl Default for PdsSection {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            request_timeout_secs: default_request_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            min_interval_secs: default_sync_interval(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        // Check env var override first
        if let Ok(dir) = std::env::var("RINGLET_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("RINGLET_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Ringlet")
        }
        #[cfg(target_os = "linux")]
        {
            dirs_fallback(".ringlet")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Ringlet")
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            dirs_fallback(".ringlet")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/ringlet"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.pds.request_timeout_secs, 10);
        assert_eq!(config.pds.page_size, 100);
        assert_eq!(config.sync.min_interval_secs, 300);
        assert_eq!(config.advanced.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: DaemonConfig =
            toml::from_str("[pds]\nservice_url = \"https://pds.example\"\n").expect("parse");
        assert_eq!(config.pds.service_url, "https://pds.example");
        assert_eq!(config.pds.request_timeout_secs, 10);
        assert_eq!(config.sync.min_interval_secs, 300);
    }
}
