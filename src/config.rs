use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::ViewScope;
use crate::cache::CacheSettings;

const DEFAULT_API_URL: &str = "http://localhost:3001";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Scope matters, invoices and clients open in
  #[serde(default)]
  pub default_scope: ViewScope,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Per-request timeout; the cache itself enforces none
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long a fetched collection is reused, applied to every kind
  #[serde(default = "default_freshness_secs")]
  pub freshness_secs: u64,
  /// Refetch collections that came back empty on every read
  #[serde(default)]
  pub empty_is_stale: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      freshness_secs: default_freshness_secs(),
      empty_is_stale: false,
    }
  }
}

fn default_freshness_secs() -> u64 {
  300
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./caseload.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/caseload/config.yaml
  ///
  /// Without a file every setting takes its default.
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
    let local = PathBuf::from("caseload.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("caseload").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    config
      .cache_settings()
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the API bearer token from the environment.
  ///
  /// Checks CASELOAD_API_TOKEN. A missing token is allowed for local backends.
  pub fn get_api_token() -> Option<String> {
    std::env::var("CASELOAD_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  pub fn cache_settings(&self) -> Result<CacheSettings> {
    let secs = self.cache.freshness_secs;
    let window = i64::try_from(secs)
      .ok()
      .and_then(chrono::Duration::try_seconds)
      .ok_or_else(|| eyre!("cache.freshness_secs is out of range: {}", secs))?;

    Ok(
      CacheSettings::default()
        .with_freshness_window(window)
        .with_empty_is_stale(self.cache.empty_is_stale)
        .with_default_scope(self.default_scope),
    )
  }

  /// Directory for rolling log files.
  pub fn log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("caseload").join("logs"))
  }
}
