use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Development backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub query: QueryConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL prepended to every relative endpoint path
  #[serde(default = "default_base_url")]
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
  /// Seconds before cached data is considered stale
  pub stale_time_secs: u64,
  /// Seconds an unobserved cache entry survives before garbage collection
  pub gc_time_secs: u64,
  /// Extra attempts for failed reads (writes never retry)
  pub retry: u32,
  pub retry_delay_ms: u64,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: 60,
      gc_time_secs: 300,
      retry: 0,
      retry_delay_ms: 500,
    }
  }
}

impl QueryConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_time_secs)
  }

  pub fn gc_time(&self) -> Duration {
    Duration::from_secs(self.gc_time_secs)
  }

  pub fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default tracing filter (overridden by UNIBOE_LOG)
  pub level: String,
  /// Directory for log files (defaults to the data directory)
  pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./uniboe.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/uniboe/config.yaml
  ///
  /// Every field has a default, so a missing file is not an error unless
  /// it was named explicitly.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    config.apply_overrides(std::env::var("UNIBOE_API_URL").ok());
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("uniboe.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("uniboe").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    let mut config: Config = serde_yaml::from_str(contents)?;
    config.api.base_url = normalize_base_url(&config.api.base_url);
    Ok(config)
  }

  /// Apply an explicit base URL override (environment or command line).
  pub fn apply_overrides(&mut self, base_url: Option<String>) {
    if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
      self.api.base_url = normalize_base_url(&url);
    }
  }

  /// Tracing filter directive, honouring UNIBOE_LOG.
  pub fn log_filter(&self) -> String {
    std::env::var("UNIBOE_LOG").unwrap_or_else(|_| self.log.level.clone())
  }

  /// Directory where log files are written.
  pub fn log_dir(&self) -> Result<PathBuf> {
    match &self.log.directory {
      Some(dir) => Ok(dir.clone()),
      None => Ok(Self::data_dir()?.join("logs")),
    }
  }

  /// Per-user data directory holding the session database and logs.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("uniboe"))
  }
}

fn normalize_base_url(url: &str) -> String {
  url.trim().trim_end_matches('/').to_string()
}
