use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_HOST: &str = "api-nba-v1.p.rapidapi.com";
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 86400;
/// Longer TTLs are clamped to this (100 years)
pub const MAX_CACHE_TTL_SECONDS: u64 = 100 * 365 * 86400;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub http: HttpConfig,
  /// Write logs to this file (rotated daily) in addition to stderr
  pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Sent as the `x-rapidapi-host` header
  #[serde(default = "default_api_host")]
  pub host: String,
  /// Override the request base URL (defaults to `https://{host}`)
  pub base_url: Option<String>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      host: default_api_host(),
      base_url: None,
    }
  }
}

impl ApiConfig {
  pub fn base_url(&self) -> String {
    self
      .base_url
      .clone()
      .unwrap_or_else(|| format!("https://{}", self.host))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long a stored response counts as fresh
  #[serde(default = "default_ttl_seconds")]
  pub ttl_seconds: u64,
  /// SQLite database location (defaults to the user data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_seconds: default_ttl_seconds(),
      path: None,
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.ttl_seconds.min(MAX_CACHE_TTL_SECONDS) as i64)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  #[serde(default = "default_connect_timeout_secs")]
  pub connect_timeout_secs: u64,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      connect_timeout_secs: default_connect_timeout_secs(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl HttpConfig {
  pub fn connect_timeout(&self) -> Duration {
    Duration::from_secs(self.connect_timeout_secs)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

fn default_api_host() -> String {
  DEFAULT_API_HOST.to_string()
}

fn default_ttl_seconds() -> u64 {
  DEFAULT_CACHE_TTL_SECONDS
}

fn default_connect_timeout_secs() -> u64 {
  10
}

fn default_timeout_secs() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./courtside.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/courtside/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("courtside.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("courtside").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the API key from environment variables.
  ///
  /// Checks COURTSIDE_API_KEY first, then RAPIDAPI_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("COURTSIDE_API_KEY")
      .or_else(|_| std::env::var("RAPIDAPI_KEY"))
      .map_err(|_| {
        eyre!("API key not found. Set COURTSIDE_API_KEY or RAPIDAPI_KEY environment variable.")
      })
  }
}
