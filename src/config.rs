//! Configuration management for auth-store.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::persist::{FileBackend, MemoryBackend, PersistenceBackend, DEFAULT_KEY};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session storage configuration.
    pub store: StoreSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local; nothing survives a restart.
    Memory,
    /// One JSON file per key under `data_dir`.
    #[default]
    File,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            _ => Err(ConfigError::InvalidValue("backend", s.to_string())),
        }
    }
}

/// Session storage section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Storage key the session is persisted under.
    pub key: String,
    /// Persistence backend.
    pub backend: BackendKind,
    /// Directory for the file backend.
    pub data_dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            backend: BackendKind::File,
            data_dir: PathBuf::from(".auth-store"),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(key) = std::env::var("AUTH_STORE_KEY") {
            if !key.is_empty() {
                self.store.key = key;
            }
        }

        if let Ok(backend) = std::env::var("AUTH_STORE_BACKEND") {
            self.store.backend = backend.parse()?;
        }

        if let Ok(dir) = std::env::var("AUTH_STORE_DATA_DIR") {
            if !dir.is_empty() {
                self.store.data_dir = PathBuf::from(dir);
            }
        }

        if let Ok(level) = std::env::var("AUTH_STORE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref key) = args.key {
            self.store.key = key.clone();
        }

        if let Some(backend) = args.backend {
            self.store.backend = backend;
        }

        if let Some(ref dir) = args.data_dir {
            self.store.data_dir = dir.clone();
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::persist::validate_key(&self.store.key)
            .map_err(|_| ConfigError::InvalidValue("key", self.store.key.clone()))
    }

    /// Build the configured persistence backend.
    pub fn build_backend(&self) -> Arc<dyn PersistenceBackend> {
        match self.store.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::File => Arc::new(FileBackend::new(&self.store.data_dir)),
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid setting value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}
