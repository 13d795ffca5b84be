//! Configuration for the activity monitor.

use crate::core::WindowResolver;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default window width in seconds.
pub const DEFAULT_WINDOW_WIDTH_SECS: u64 = 30;

/// Default prefix of every bucket key.
pub const DEFAULT_KEY_PREFIX: &str = "ActivityMonitor";

/// Main configuration for the activity monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Width of each window; also the length of the sliding window
    #[serde(with = "duration_serde")]
    pub window_width: Duration,

    /// Prefix of every store key
    pub key_prefix: String,

    /// Port the HTTP server binds to (0 for random)
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: Duration::from_secs(DEFAULT_WINDOW_WIDTH_SECS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            server_port: 7878,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-monitor")
            .join("config.json")
    }

    /// Check that the settings describe a usable monitor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        self.resolver().map(|_| ())
    }

    /// Build the window resolver described by this configuration.
    pub fn resolver(&self) -> Result<WindowResolver, ConfigError> {
        WindowResolver::new(self.key_prefix.clone(), self.window_width)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("window width must be whole seconds between 1 and 60, got {0:?}")]
    InvalidWidth(Duration),
    #[error("key prefix must not be empty")]
    EmptyPrefix,
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
