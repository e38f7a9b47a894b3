//! Configuration for gator.
//!
//! Configuration is read from `~/.config/gator/config.toml` unless another
//! path is given on the command line. If the file doesn't exist, a default
//! configuration with comments is created. The current user is stored here
//! too, so `register`, `login` and `reset` write the file back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,
    pub fetch: FetchSettings,
    pub log: LogConfig,
}

/// HTTP fetch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Larger response bodies are rejected
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set
    pub filter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            current_user_name: None,
            fetch: FetchSettings::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: concat!("gator/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "gator=info".to_string(),
            file: None,
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gator")
        .join("gator.db")
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::create_default_config(path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Write the configuration back to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        ensure_parent(path)?;
        fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Set (or clear) the current user and persist the change.
    pub fn set_current_user(&mut self, name: Option<&str>, path: &Path) -> Result<(), ConfigError> {
        self.current_user_name = name.map(String::from);
        self.save(path)
    }

    /// Get the default config file path: `~/.config/gator/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("gator").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        ensure_parent(path)?;
        fs::write(path, Self::default_config_content()).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        format!(
            r##"# gator configuration
#
# database_path = "/path/to/gator.db"
#   Defaults to the platform data directory, e.g. ~/.local/share/gator/gator.db
#
# current_user_name is managed by `gator register`, `gator login` and
# `gator reset`.

[fetch]
# Sent with every feed request
user_agent = "{user_agent}"

# Whole-request timeout in seconds
timeout_secs = 30

# Responses larger than this are rejected (bytes)
max_body_bytes = 10485760

[log]
# tracing filter directives, overridden by RUST_LOG
filter = "gator=info"

# Also write logs to this file
# file = "/tmp/gator.log"
"##,
            user_agent = FetchSettings::default().user_agent
        )
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
