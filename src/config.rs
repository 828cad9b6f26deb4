use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Account used by `--login` when AGENTDASH_EMAIL is not set
  pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the REST API; relative request paths are joined onto it
  pub base_url: String,
  /// Base URL of the realtime socket endpoint
  pub socket_url: Option<String>,
  /// OAuth client id for Google sign-in
  pub oauth_client_id: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long query results stay cached after their last subscriber is gone
  #[serde(default = "default_keep_unused_secs")]
  pub keep_unused_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      keep_unused_secs: default_keep_unused_secs(),
    }
  }
}

impl CacheConfig {
  pub fn keep_unused_for(&self) -> Duration {
    Duration::from_secs(self.keep_unused_secs)
  }
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_keep_unused_secs() -> u64 {
  60
}

const ENV_API_URL: &str = "AGENTDASH_API_URL";
const ENV_SOCKET_URL: &str = "AGENTDASH_SOCKET_URL";
const ENV_OAUTH_CLIENT_ID: &str = "AGENTDASH_OAUTH_CLIENT_ID";

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./agentdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/agentdash/config.yaml
  ///
  /// With no file at all, AGENTDASH_API_URL alone is enough.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::from_env()?,
    };

    Ok(config.with_env_overrides())
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("agentdash.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("agentdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  fn from_env() -> Result<Self> {
    let base_url = std::env::var(ENV_API_URL).map_err(|_| {
      eyre!(
        "No configuration file found. Create one at ~/.config/agentdash/config.yaml \
         or set {}.",
        ENV_API_URL
      )
    })?;

    Ok(Self {
      api: ApiConfig {
        base_url,
        socket_url: None,
        oauth_client_id: None,
        timeout_secs: default_timeout_secs(),
      },
      cache: CacheConfig::default(),
      email: None,
    })
  }

  fn with_env_overrides(self) -> Self {
    self.with_overrides(|key| std::env::var(key).ok())
  }

  fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(url) = lookup(ENV_API_URL) {
      self.api.base_url = url;
    }
    if let Some(url) = lookup(ENV_SOCKET_URL) {
      self.api.socket_url = Some(url);
    }
    if let Some(id) = lookup(ENV_OAUTH_CLIENT_ID) {
      self.api.oauth_client_id = Some(id);
    }
    self
  }

  /// Sign-in email: AGENTDASH_EMAIL, falling back to the config file.
  pub fn get_email(&self) -> Result<String> {
    std::env::var("AGENTDASH_EMAIL")
      .ok()
      .or_else(|| self.email.clone())
      .ok_or_else(|| eyre!("No account email. Set AGENTDASH_EMAIL or `email` in the config file."))
  }

  /// Get the account password from environment variables.
  pub fn get_password() -> Result<String> {
    std::env::var("AGENTDASH_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set AGENTDASH_PASSWORD environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  base_url: https://api.example.com\n").unwrap();

    assert_eq!(config.api.base_url, "https://api.example.com");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.keep_unused_for(), Duration::from_secs(60));
    assert!(config.email.is_none());
  }

  #[test]
  fn test_parse_full_config() {
    let yaml = r#"
api:
  base_url: https://api.example.com
  socket_url: wss://ws.example.com
  oauth_client_id: client-123
  timeout_secs: 5
cache:
  keep_unused_secs: 0
email: ops@example.com
"#;
    let config = Config::parse(yaml).unwrap();

    assert_eq!(config.api.socket_url.as_deref(), Some("wss://ws.example.com"));
    assert_eq!(config.api.oauth_client_id.as_deref(), Some("client-123"));
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.cache.keep_unused_for(), Duration::ZERO);
    assert_eq!(config.email.as_deref(), Some("ops@example.com"));
  }

  #[test]
  fn test_missing_base_url_is_an_error() {
    assert!(Config::parse("api:\n  socket_url: wss://x\n").is_err());
  }

  #[test]
  fn test_overrides_replace_file_values() {
    let config = Config::parse("api:\n  base_url: https://file.example.com\n")
      .unwrap()
      .with_overrides(|key| match key {
        ENV_API_URL => Some("https://env.example.com".to_string()),
        ENV_OAUTH_CLIENT_ID => Some("env-client".to_string()),
        _ => None,
      });

    assert_eq!(config.api.base_url, "https://env.example.com");
    assert_eq!(config.api.oauth_client_id.as_deref(), Some("env-client"));
    assert!(config.api.socket_url.is_none());
  }
}
