//! Cloudflare DNS provider, using the REST API v4.
//!
//! - `GET /zones?name={domain}` - look up the zone when no zone id is given
//! - `POST /zones/{zone_id}/dns_records` - create the TXT record
//! - `DELETE /zones/{zone_id}/dns_records/{record_id}` - remove it

use super::DnsProvider;
use super::DnsProviderError;
use super::DnsRecord;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use tracing::warn;

const CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

const CLOUDFLARE_PROPAGATION_DELAY: Duration = Duration::from_secs(10);

/// Minimum TTL Cloudflare accepts.
const CLOUDFLARE_DNS_TTL: u32 = 60;

/// Credentials stored in a CloudFlare DNS account.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum CloudflareAuth {
  #[serde(rename_all = "camelCase")]
  Token {
    api_token: String,
    zone_id: Option<String>,
  },
  #[serde(rename_all = "camelCase")]
  GlobalKey {
    email: String,
    api_key: String,
    zone_id: Option<String>,
  },
}

impl std::fmt::Debug for CloudflareAuth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CloudflareAuth::Token { zone_id, .. } => f
        .debug_struct("Token")
        .field("zone_id", zone_id)
        .finish_non_exhaustive(),
      CloudflareAuth::GlobalKey { email, zone_id, .. } => f
        .debug_struct("GlobalKey")
        .field("email", email)
        .field("zone_id", zone_id)
        .finish_non_exhaustive(),
    }
  }
}

impl CloudflareAuth {
  fn zone_id(&self) -> Option<&str> {
    match self {
      CloudflareAuth::Token { zone_id, .. }
      | CloudflareAuth::GlobalKey { zone_id, .. } => zone_id.as_deref(),
    }
  }
}

#[derive(Debug)]
pub struct CloudflareProvider {
  client: reqwest::Client,
  base_url: String,
  headers: HeaderMap,
  zone_id: Option<String>,
}

fn header_value(value: &str) -> Result<HeaderValue, DnsProviderError> {
  HeaderValue::from_str(value).map_err(|_| {
    DnsProviderError::Config(
      "CloudFlare credentials contain invalid characters".to_string(),
    )
  })
}

impl CloudflareProvider {
  pub fn new(
    auth: CloudflareAuth,
    timeout: Duration,
  ) -> Result<Self, DnsProviderError> {
    Self::with_base_url(auth, timeout, CLOUDFLARE_API_URL.to_string())
  }

  /// Like [`CloudflareProvider::new`], against another API endpoint.
  pub fn with_base_url(
    auth: CloudflareAuth,
    timeout: Duration,
    base_url: String,
  ) -> Result<Self, DnsProviderError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| {
        DnsProviderError::Config(format!("failed to build HTTP client: {}", e))
      })?;

    // Credentials are validated here so requests never fail on headers.
    let mut headers = HeaderMap::new();
    match &auth {
      CloudflareAuth::Token { api_token, .. } => {
        headers
          .insert(AUTHORIZATION, header_value(&format!("Bearer {}", api_token))?);
      }
      CloudflareAuth::GlobalKey { email, api_key, .. } => {
        headers.insert(HeaderName::from_static("x-auth-email"), header_value(email)?);
        headers.insert(HeaderName::from_static("x-auth-key"), header_value(api_key)?);
      }
    }

    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      headers,
      zone_id: auth.zone_id().map(str::to_string),
    })
  }

  /// Finds the zone for `name` by trying progressively shorter suffixes,
  /// e.g. `_acme-challenge.sub.example.com`, `sub.example.com`,
  /// `example.com`.
  async fn lookup_zone_id(&self, name: &str) -> Result<String, DnsProviderError> {
    let parts: Vec<&str> = name.split('.').collect();

    for i in 0..parts.len().saturating_sub(1) {
      let zone_name = parts[i..].join(".");
      debug!(zone_name = %zone_name, "Looking up Cloudflare zone");

      let response = self
        .client
        .get(format!("{}/zones", self.base_url))
        .query(&[("name", zone_name.as_str())])
        .headers(self.headers.clone())
        .send()
        .await?;

      let status = response.status();
      let body: CloudflareResponse<Vec<Zone>> = response.json().await?;
      if !body.success {
        return Err(api_error(status.as_u16(), &body.errors));
      }

      if let Some(zone) = body
        .result
        .unwrap_or_default()
        .into_iter()
        .find(|z| z.name == zone_name)
      {
        debug!(zone_id = %zone.id, zone_name = %zone.name, "Found Cloudflare zone");
        return Ok(zone.id);
      }
    }

    Err(DnsProviderError::ZoneNotFound(name.to_string()))
  }

  async fn zone_for(&self, name: &str) -> Result<String, DnsProviderError> {
    match &self.zone_id {
      Some(zone_id) => Ok(zone_id.clone()),
      None => self.lookup_zone_id(name).await,
    }
  }
}

fn api_error(status: u16, errors: &[CloudflareError]) -> DnsProviderError {
  let message = errors
    .iter()
    .map(|e| format!("{}: {}", e.code, e.message))
    .collect::<Vec<_>>()
    .join(", ");
  DnsProviderError::Api { status, message }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
  async fn create_txt_record(
    &self,
    name: &str,
    content: &str,
  ) -> Result<DnsRecord, DnsProviderError> {
    let zone_id = self.zone_for(name).await?;
    debug!(name = %name, zone_id = %zone_id, "Creating Cloudflare TXT record");

    let response = self
      .client
      .post(format!("{}/zones/{}/dns_records", self.base_url, zone_id))
      .headers(self.headers.clone())
      .json(&CreateDnsRecord {
        record_type: "TXT",
        name,
        content,
        ttl: CLOUDFLARE_DNS_TTL,
      })
      .send()
      .await?;

    let status = response.status();
    let body: CloudflareResponse<DnsRecordResponse> = response.json().await?;
    if !body.success {
      return Err(api_error(status.as_u16(), &body.errors));
    }
    let record = body.result.ok_or_else(|| {
      DnsProviderError::Parse("create response has no result".to_string())
    })?;

    debug!(record_id = %record.id, "Created Cloudflare TXT record");
    Ok(DnsRecord {
      record_id: record.id,
      name: name.to_string(),
      zone: Some(zone_id),
    })
  }

  async fn delete_txt_record(
    &self,
    record: &DnsRecord,
  ) -> Result<(), DnsProviderError> {
    let zone_id = match &record.zone {
      Some(zone_id) => zone_id.clone(),
      None => self.zone_for(&record.name).await?,
    };
    debug!(record_id = %record.record_id, name = %record.name, "Deleting Cloudflare TXT record");

    let response = self
      .client
      .delete(format!(
        "{}/zones/{}/dns_records/{}",
        self.base_url, zone_id, record.record_id
      ))
      .headers(self.headers.clone())
      .send()
      .await?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
      debug!(record_id = %record.record_id, "Record already deleted");
      return Ok(());
    }

    let body: CloudflareResponse<serde_json::Value> = response.json().await?;
    if !body.success {
      let err = api_error(status.as_u16(), &body.errors);
      warn!(error = %err, "Failed to delete Cloudflare TXT record");
      return Err(err);
    }

    Ok(())
  }

  fn propagation_delay(&self) -> Duration {
    CLOUDFLARE_PROPAGATION_DELAY
  }

  fn name(&self) -> &'static str {
    "cloudflare"
  }
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
  success: bool,
  #[serde(default)]
  errors: Vec<CloudflareError>,
  result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
  code: i32,
  message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
  id: String,
  name: String,
}

#[derive(Debug, Serialize)]
struct CreateDnsRecord<'a> {
  #[serde(rename = "type")]
  record_type: &'static str,
  name: &'a str,
  content: &'a str,
  ttl: u32,
}

#[derive(Debug, Deserialize)]
struct DnsRecordResponse {
  id: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_tokens_with_invalid_header_characters() {
    let err = CloudflareProvider::new(
      CloudflareAuth::Token {
        api_token: "token\nwith newline".to_string(),
        zone_id: None,
      },
      Duration::from_secs(5),
    )
    .unwrap_err();
    assert!(matches!(err, DnsProviderError::Config(_)));
  }

  #[test]
  fn debug_output_hides_secrets() {
    let auth = CloudflareAuth::GlobalKey {
      email: "ops@example.com".to_string(),
      api_key: "secret-key".to_string(),
      zone_id: None,
    };
    let debug = format!("{:?}", auth);
    assert!(debug.contains("ops@example.com"));
    assert!(!debug.contains("secret-key"));
  }
}
