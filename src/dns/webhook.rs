//! Generic webhook DNS provider, for DNS services without native support.
//!
//! Create: `POST {createUrl}` with `{"type": "TXT", "name": ..., "content": ...}`,
//! answered by `{"id": "record-identifier"}`.
//!
//! Delete: `DELETE {deleteUrl}` with `{record_id}` substituted, any 2xx or
//! 404 status counts as success.

use super::DnsProvider;
use super::DnsProviderError;
use super::DnsRecord;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use tracing::warn;

/// Webhook backed DNS is usually slower to propagate than a native API.
const WEBHOOK_PROPAGATION_DELAY: Duration = Duration::from_secs(120);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WebhookAuthorization {
  create_url: String,
  delete_url: String,
  #[serde(default)]
  headers: HashMap<String, String>,
  propagation_delay: Option<u64>,
}

#[derive(Debug)]
pub struct WebhookProvider {
  client: reqwest::Client,
  create_url: String,
  delete_url: String,
  headers: HeaderMap,
  propagation_delay: Duration,
}

impl WebhookProvider {
  pub fn new(
    create_url: String,
    delete_url: String,
    headers: &HashMap<String, String>,
    timeout: Duration,
  ) -> Result<Self, DnsProviderError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| {
        DnsProviderError::Config(format!("failed to build HTTP client: {}", e))
      })?;

    let mut header_map = HeaderMap::new();
    for (key, value) in headers {
      let name = HeaderName::try_from(key.as_str()).map_err(|e| {
        DnsProviderError::Config(format!("invalid header name '{}': {}", key, e))
      })?;
      let value = HeaderValue::from_str(value).map_err(|e| {
        DnsProviderError::Config(format!(
          "invalid header value for '{}': {}",
          key, e
        ))
      })?;
      header_map.insert(name, value);
    }

    Ok(Self {
      client,
      create_url,
      delete_url,
      headers: header_map,
      propagation_delay: WEBHOOK_PROPAGATION_DELAY,
    })
  }

  pub(crate) fn from_authorization(
    authorization: &str,
    timeout: Duration,
  ) -> Result<Self, DnsProviderError> {
    let auth: WebhookAuthorization = serde_json::from_str(authorization)
      .map_err(|e| {
        DnsProviderError::Config(format!("invalid webhook authorization: {}", e))
      })?;
    for url in [&auth.create_url, &auth.delete_url] {
      if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(DnsProviderError::Config(format!(
          "webhook url must be http(s): {}",
          url
        )));
      }
    }

    let mut provider =
      Self::new(auth.create_url, auth.delete_url, &auth.headers, timeout)?;
    if let Some(delay) = auth.propagation_delay {
      provider = provider.with_propagation_delay(Duration::from_secs(delay));
    }
    Ok(provider)
  }

  pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
    self.propagation_delay = delay;
    self
  }
}

#[derive(Debug, Serialize)]
struct WebhookCreateRequest<'a> {
  #[serde(rename = "type")]
  record_type: &'static str,
  name: &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WebhookCreateResponse {
  id: String,
}

#[async_trait]
impl DnsProvider for WebhookProvider {
  async fn create_txt_record(
    &self,
    name: &str,
    content: &str,
  ) -> Result<DnsRecord, DnsProviderError> {
    debug!(name = %name, url = %self.create_url, "Creating TXT record via webhook");

    let response = self
      .client
      .post(&self.create_url)
      .headers(self.headers.clone())
      .json(&WebhookCreateRequest {
        record_type: "TXT",
        name,
        content,
      })
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
      return Err(DnsProviderError::Api {
        status: status.as_u16(),
        message: body,
      });
    }

    let body: WebhookCreateResponse = response.json().await.map_err(|e| {
      DnsProviderError::Parse(format!("failed to parse create response: {}", e))
    })?;

    Ok(DnsRecord {
      record_id: body.id,
      name: name.to_string(),
      zone: None,
    })
  }

  async fn delete_txt_record(
    &self,
    record: &DnsRecord,
  ) -> Result<(), DnsProviderError> {
    let url = self.delete_url.replace("{record_id}", &record.record_id);
    debug!(record_id = %record.record_id, url = %url, "Deleting TXT record via webhook");

    let response = self
      .client
      .delete(&url)
      .headers(self.headers.clone())
      .send()
      .await?;

    let status = response.status();
    if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
      return Ok(());
    }

    let message = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Failed to delete TXT record via webhook");
    Err(DnsProviderError::Api {
      status: status.as_u16(),
      message,
    })
  }

  fn propagation_delay(&self) -> Duration {
    self.propagation_delay
  }

  fn name(&self) -> &'static str {
    "webhook"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TIMEOUT: Duration = Duration::from_secs(5);

  #[test]
  fn authorization_sets_propagation_delay() {
    let provider = WebhookProvider::from_authorization(
      r#"{"createUrl": "https://dns/r", "deleteUrl": "https://dns/r/{record_id}", "propagationDelay": 5}"#,
      TIMEOUT,
    )
    .unwrap();
    assert_eq!(provider.propagation_delay(), Duration::from_secs(5));
  }

  #[test]
  fn rejects_bad_headers_and_urls() {
    let err = WebhookProvider::from_authorization(
      r#"{"createUrl": "https://dns/r", "deleteUrl": "https://dns/r", "headers": {"bad header": "x"}}"#,
      TIMEOUT,
    )
    .unwrap_err();
    assert!(matches!(err, DnsProviderError::Config(_)));

    let err = WebhookProvider::from_authorization(
      r#"{"createUrl": "dns/r", "deleteUrl": "https://dns/r"}"#,
      TIMEOUT,
    )
    .unwrap_err();
    assert!(matches!(err, DnsProviderError::Config(_)));
  }
}
