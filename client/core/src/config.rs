//! TOML Configuration File Support
//!
//! Centralized configuration loading for the client core, supporting a TOML
//! configuration file at `~/.config/tracksync/client.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. Environment variables (`TRACKSYNC_BASE_URL`, `TRACKSYNC_WORKERS`,
//!    `TRACKSYNC_TIMEOUT_SECS`)
//! 2. TOML configuration file
//! 3. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows the XDG Base Directory specification:
//! `$XDG_CONFIG_HOME/tracksync/client.toml` (typically
//! `~/.config/tracksync/client.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! base_url = "http://127.0.0.1:5000"
//! workers = 1
//! request_timeout_secs = 120
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base URL used when neither file nor environment provides one.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

const DEFAULT_WORKERS: usize = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

const ENV_BASE_URL: &str = "TRACKSYNC_BASE_URL";
const ENV_WORKERS: &str = "TRACKSYNC_WORKERS";
const ENV_TIMEOUT_SECS: &str = "TRACKSYNC_TIMEOUT_SECS";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// TOML Structure
// =============================================================================

/// On-disk configuration; every field optional so a partial file works.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Sync server base URL.
    pub base_url: Option<String>,

    /// Worker slots for the session's job queue.
    pub workers: Option<usize>,

    /// End-to-end deadline for one server call, in seconds.
    pub request_timeout_secs: Option<u64>,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Sync server base URL.
    pub base_url: String,

    /// Worker slots for the session's job queue; at least 1.
    pub workers: usize,

    /// End-to-end deadline for one server call.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            workers: DEFAULT_WORKERS,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// The XDG path of the configuration file, when a config directory exists.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tracksync").join("client.toml"))
}

/// Load configuration from the default location, applying environment
/// overrides. A missing file is not an error; defaults apply.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or
/// parsed, or when a resolved value fails validation.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    let file = match default_config_path() {
        Some(path) if path.exists() => read_toml(&path)?,
        _ => ClientToml::default(),
    };
    resolve(file, &env_lookup)
}

/// Load configuration from an explicit path, applying environment overrides.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, or when
/// a resolved value fails validation.
pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let file = read_toml(path)?;
    resolve(file, &env_lookup)
}

fn read_toml(path: &Path) -> Result<ClientToml, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Merge file values with environment overrides and validate the result.
///
/// Split out from the `std::env` wrappers so tests can inject an
/// environment instead of mutating process state.
fn resolve(
    file: ClientToml,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let base_url = env(ENV_BASE_URL)
        .or(file.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let workers = match env(ENV_WORKERS) {
        Some(raw) => raw.parse().map_err(|_| {
            ConfigError::ValidationError(format!("{ENV_WORKERS} is not a number: {raw:?}"))
        })?,
        None => file.workers.unwrap_or(DEFAULT_WORKERS),
    };

    let timeout_secs = match env(ENV_TIMEOUT_SECS) {
        Some(raw) => raw.parse().map_err(|_| {
            ConfigError::ValidationError(format!("{ENV_TIMEOUT_SECS} is not a number: {raw:?}"))
        })?,
        None => file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    };

    if base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "base_url must not be empty".to_string(),
        ));
    }
    if workers == 0 {
        return Err(ConfigError::ValidationError(
            "workers must be at least 1".to_string(),
        ));
    }

    Ok(ClientConfig {
        base_url,
        workers,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

// =============================================================================
// Tests
// =============================================================================
