//! Configuration management for vaultsearch.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.vaultsearch/config.yaml)
//!
//! The configuration is vault-centric: index state lives in `<vault>/.vaultsearch/`
//! unless a data directory is configured explicitly. Index and embedding
//! sections of the same file are read by the index crate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-vault state directory.
pub const DATA_DIR_NAME: &str = ".vaultsearch";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the note vault
    pub vault: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Directory holding index blobs (default: `<vault>/.vaultsearch`)
    pub data_dir: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Sections of the config file owned by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    vault: Option<VaultSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultSection {
    path: Option<String>,
    #[serde(rename = "dataDir")]
    data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vault: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            data_dir: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the YAML file and defaults.
    ///
    /// Environment variables:
    /// - `VAULTSEARCH_VAULT`: Override vault path
    /// - `VAULTSEARCH_CONFIG`: Path to config file
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use vaultsearch_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Vault: {:?}", config.vault);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(vault) = std::env::var("VAULTSEARCH_VAULT") {
            config.vault = PathBuf::from(vault);
        }

        if let Ok(config_file) = std::env::var("VAULTSEARCH_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(vault) = config_file.vault {
            if let Some(path) = vault.path {
                result.vault = PathBuf::from(path);
            }
            if let Some(data_dir) = vault.data_dir {
                result.data_dir = Some(PathBuf::from(data_dir));
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        vault: Option<PathBuf>,
        config_file: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(vault) = vault {
            self.vault = vault;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(data_dir) = data_dir {
            self.data_dir = Some(data_dir);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path of the YAML config file in effect.
    pub fn config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.vault.join(DATA_DIR_NAME).join("config.yaml"))
    }

    /// Directory holding the persisted index blobs.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| self.vault.join(DATA_DIR_NAME))
    }

    /// Ensure the data directory exists.
    pub fn ensure_data_dir(&self) -> AppResult<()> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|e| {
                AppError::Config(format!("Failed to create data directory {:?}: {}", data_dir, e))
            })?;
        }
        Ok(())
    }

    /// Validate that the vault is usable.
    pub fn validate(&self) -> AppResult<()> {
        if !self.vault.is_dir() {
            return Err(AppError::Config(format!(
                "Vault directory does not exist: {:?}",
                self.vault
            )));
        }
        Ok(())
    }
}
