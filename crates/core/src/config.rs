//! Process configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration of the plugin runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub logging: LoggingConfig,
    pub resource_packs: ResourcePackSettings,
    pub digging: DiggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set, e.g. `info` or `ms=debug`
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePackSettings {
    /// Pack definitions; artifact files are stored next to it
    pub config_path: PathBuf,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiggingSettings {
    /// Period of the break animation task. One game tick is 50ms.
    pub tick_period_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for ResourcePackSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("resource-packs.toml"),
            http_timeout_secs: 30,
            user_agent: concat!("ms-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for DiggingSettings {
    fn default() -> Self {
        Self { tick_period_ms: 50 }
    }
}

impl ResourcePackSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl DiggingSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}

impl ServerConfig {
    /// Load configuration from file with format detection
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let config: ServerConfig = match ConfigFormat::from_extension(path) {
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(format!("JSON parse error: {}", e)))?,
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(format!("TOML parse error: {}", e)))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise write and return the defaults
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if path.exists() {
            return Self::load_from_file(path);
        }

        let config = Self::default();
        config.save_to_file(path)?;
        tracing::info!("Created default configuration at {}", path.display());

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        let content = match ConfigFormat::from_extension(path) {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::ParseFailed(format!("JSON serialize error: {}", e)))?,
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| ConfigError::ParseFailed(format!("TOML serialize error: {}", e)))?,
        };

        std::fs::write(path, content).map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("Log level cannot be empty".to_string()));
        }

        if self.resource_packs.config_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Resource pack config path cannot be empty".to_string()));
        }

        if self.resource_packs.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("HTTP timeout cannot be 0".to_string()));
        }

        if self.resource_packs.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("User agent cannot be empty".to_string()));
        }

        if self.digging.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("Digging tick period cannot be 0".to_string()));
        }

        Ok(())
    }

    /// Resolve relative paths against the directory of the configuration file
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.resource_packs.config_path.is_relative() {
            self.resource_packs.config_path = base.join(&self.resource_packs.config_path);
        }
    }
}

/// Configuration file format detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
