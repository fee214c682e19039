//! Application configuration for dailydigest.
//!
//! User config lives at `~/.dailydigest/dailydigest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dailydigest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dailydigest";

/// Default snapshot file name inside the config directory.
const SNAPSHOT_FILE_NAME: &str = "cache.json";

// ---------------------------------------------------------------------------
// Config structs (matching dailydigest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daily API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Cache and persistence settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the daily digest API; the date key is appended as a path
    /// segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent header sent on every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect/read timeout in seconds for all fetches.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://daily.tangenty.com/api/v1/digest".into()
}
fn default_user_agent() -> String {
    concat!("dailydigest/", env!("CARGO_PKG_VERSION")).into()
}
fn default_timeout_secs() -> u64 {
    10
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of digests held before LRU eviction.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Snapshot file path. Defaults to `~/.dailydigest/cache.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_file: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            snapshot_file: None,
        }
    }
}

fn default_capacity() -> usize {
    crate::types::MAX_CACHE_SIZE
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL of the daily digest API.
    pub base_url: String,
    /// User-Agent header for all requests.
    pub user_agent: String,
    /// Connect/read timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            user_agent: config.api.user_agent.clone(),
            timeout_secs: config.api.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dailydigest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DigestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dailydigest/dailydigest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the snapshot file path from config, falling back to the default
/// location under the config directory.
pub fn snapshot_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.cache.snapshot_file {
        Some(p) => Ok(PathBuf::from(p)),
        None => Ok(config_dir()?.join(SNAPSHOT_FILE_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DigestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DigestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DigestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DigestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DigestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
