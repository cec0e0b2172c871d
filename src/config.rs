//! Configuration for the bundled ACME client.
//!
//! ```toml
//! directory_url = "https://acme-v02.api.letsencrypt.org/directory"
//! poll_interval = 3
//! poll_attempts = 20
//! http_timeout = 30
//! certificate_key = "ec256"
//! dns_propagation_delay = 30
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const LETS_ENCRYPT_URL: &str =
  "https://acme-v02.api.letsencrypt.org/directory";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration file: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse configuration: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

/// The key type generated for each issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateKey {
  #[default]
  Rsa2048,
  Rsa4096,
  Ec256,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// ACME directory URL.
  pub directory_url: String,

  /// Seconds between polls of orders, authorizations and challenges.
  pub poll_interval: u64,

  /// Polls before an order is given up on.
  pub poll_attempts: usize,

  /// Request timeout for the CA and DNS provider APIs, in seconds.
  pub http_timeout: u64,

  pub certificate_key: CertificateKey,

  /// Overrides the provider's own DNS propagation delay, in seconds.
  pub dns_propagation_delay: Option<u64>,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      directory_url: LETS_ENCRYPT_URL.to_string(),
      poll_interval: 3,
      poll_attempts: 20,
      http_timeout: 30,
      certificate_key: CertificateKey::default(),
      dns_propagation_delay: None,
    }
  }
}

impl Config {
  pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
    let config: Config = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Self::from_toml_str(&raw)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.directory_url.starts_with("https://")
      && !self.directory_url.starts_with("http://")
    {
      return Err(ConfigError::Invalid(format!(
        "directory_url must be an http(s) URL, got {:?}",
        self.directory_url
      )));
    }
    if self.poll_attempts == 0 {
      return Err(ConfigError::Invalid(
        "poll_attempts must be at least 1".to_string(),
      ));
    }
    if self.http_timeout == 0 {
      return Err(ConfigError::Invalid(
        "http_timeout must be at least 1 second".to_string(),
      ));
    }
    Ok(())
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval)
  }

  pub fn http_timeout(&self) -> Duration {
    Duration::from_secs(self.http_timeout)
  }

  pub fn dns_propagation_delay(&self) -> Option<Duration> {
    self.dns_propagation_delay.map(Duration::from_secs)
  }
}
