//! DNS providers for DNS-01 challenges.
//!
//! A provider is built from a stored DNS account: its type selects the
//! implementation and its JSON authorization carries the credentials.
//!
//! | type         | authorization                                               |
//! |--------------|-------------------------------------------------------------|
//! | `CloudFlare` | `{"apiToken": "...", "zoneId": "..."}` (zone id optional)   |
//! |              | or `{"email": "...", "apiKey": "..."}`                      |
//! | `Webhook`    | `{"createUrl": "...", "deleteUrl": ".../{record_id}", "headers": {}}` |

mod cloudflare;
mod webhook;

pub use cloudflare::CloudflareAuth;
pub use cloudflare::CloudflareProvider;
pub use webhook::WebhookProvider;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DnsProviderError {
  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("DNS API error: {status} - {message}")]
  Api { status: u16, message: String },

  #[error("failed to parse API response: {0}")]
  Parse(String),

  #[error("zone not found for domain: {0}")]
  ZoneNotFound(String),

  #[error("unsupported DNS provider type: {0}")]
  UnsupportedType(String),

  #[error("configuration error: {0}")]
  Config(String),
}

/// A TXT record created by a provider, kept for cleanup.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DnsRecord {
  pub record_id: String,
  /// The full record name, e.g. `_acme-challenge.example.com`.
  pub name: String,
  /// Provider specific zone the record lives in.
  pub zone: Option<String>,
}

#[async_trait]
pub trait DnsProvider: Send + Sync + fmt::Debug {
  async fn create_txt_record(
    &self,
    name: &str,
    content: &str,
  ) -> Result<DnsRecord, DnsProviderError>;

  /// Best-effort removal of a record created by this provider.
  async fn delete_txt_record(
    &self,
    record: &DnsRecord,
  ) -> Result<(), DnsProviderError>;

  fn propagation_delay(&self) -> Duration {
    DEFAULT_PROPAGATION_DELAY
  }

  fn name(&self) -> &'static str;
}

/// Builds the provider for a stored DNS account.
pub fn provider_from_account(
  provider_type: &str,
  authorization: &str,
  timeout: Duration,
) -> Result<Box<dyn DnsProvider>, DnsProviderError> {
  match provider_type.to_ascii_lowercase().as_str() {
    "cloudflare" => {
      let auth = serde_json::from_str::<CloudflareAuth>(authorization)
        .map_err(|e| {
          DnsProviderError::Config(format!(
            "invalid CloudFlare authorization: {}",
            e
          ))
        })?;
      Ok(Box::new(CloudflareProvider::new(auth, timeout)?))
    }
    "webhook" => Ok(Box::new(WebhookProvider::from_authorization(
      authorization,
      timeout,
    )?)),
    _ => Err(DnsProviderError::UnsupportedType(provider_type.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TIMEOUT: Duration = Duration::from_secs(5);

  #[test]
  fn builds_cloudflare_from_token() {
    let provider = provider_from_account(
      "CloudFlare",
      r#"{"apiToken": "token", "zoneId": "zone123"}"#,
      TIMEOUT,
    )
    .unwrap();
    assert_eq!(provider.name(), "cloudflare");
  }

  #[test]
  fn builds_cloudflare_from_global_key() {
    let provider = provider_from_account(
      "CloudFlare",
      r#"{"email": "ops@example.com", "apiKey": "key"}"#,
      TIMEOUT,
    )
    .unwrap();
    assert_eq!(provider.name(), "cloudflare");
  }

  #[test]
  fn rejects_malformed_authorization() {
    let err = provider_from_account("CloudFlare", "not json", TIMEOUT)
      .unwrap_err();
    assert!(matches!(err, DnsProviderError::Config(_)));

    let err = provider_from_account("CloudFlare", r#"{"zoneId": "z"}"#, TIMEOUT)
      .unwrap_err();
    assert!(matches!(err, DnsProviderError::Config(_)));
  }

  #[test]
  fn rejects_unknown_types() {
    let err = provider_from_account("AliYun", "{}", TIMEOUT).unwrap_err();
    assert!(matches!(err, DnsProviderError::UnsupportedType(t) if t == "AliYun"));
  }

  #[test]
  fn builds_webhook() {
    let provider = provider_from_account(
      "Webhook",
      r#"{"createUrl": "https://dns/records", "deleteUrl": "https://dns/records/{record_id}"}"#,
      TIMEOUT,
    )
    .unwrap();
    assert_eq!(provider.name(), "webhook");
  }
}
