//! DNS provider API contracts, checked against mock HTTP servers.

use acme2_certs::dns::CloudflareAuth;
use acme2_certs::dns::CloudflareProvider;
use acme2_certs::dns::DnsProvider;
use acme2_certs::dns::DnsProviderError;
use acme2_certs::dns::DnsRecord;
use acme2_certs::dns::WebhookProvider;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

const TIMEOUT: Duration = Duration::from_secs(5);

mod cloudflare {
  use super::*;

  fn token(zone_id: Option<&str>) -> CloudflareAuth {
    CloudflareAuth::Token {
      api_token: "test-token".to_string(),
      zone_id: zone_id.map(str::to_string),
    }
  }

  #[tokio::test]
  async fn creates_record_in_configured_zone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/zones/zone123/dns_records"))
      .and(header("authorization", "Bearer test-token"))
      .and(body_partial_json(json!({
        "type": "TXT",
        "name": "_acme-challenge.example.com",
        "content": "digest",
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "result": { "id": "record-abc123" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let provider =
      CloudflareProvider::with_base_url(token(Some("zone123")), TIMEOUT, server.uri())
        .unwrap();
    let record = provider
      .create_txt_record("_acme-challenge.example.com", "digest")
      .await
      .unwrap();

    assert_eq!(record.record_id, "record-abc123");
    assert_eq!(record.name, "_acme-challenge.example.com");
    assert_eq!(record.zone.as_deref(), Some("zone123"));
  }

  #[tokio::test]
  async fn looks_up_zone_by_walking_parent_domains() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/zones"))
      .and(query_param("name", "example.com"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "result": [{ "id": "zone-example", "name": "example.com" }]
      })))
      .with_priority(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/zones"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "result": []
      })))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/zones/zone-example/dns_records"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "result": { "id": "record-1" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let provider =
      CloudflareProvider::with_base_url(token(None), TIMEOUT, server.uri())
        .unwrap();
    let record = provider
      .create_txt_record("_acme-challenge.www.example.com", "digest")
      .await
      .unwrap();
    assert_eq!(record.zone.as_deref(), Some("zone-example"));
  }

  #[tokio::test]
  async fn unknown_zone_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/zones"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "result": []
      })))
      .mount(&server)
      .await;

    let provider =
      CloudflareProvider::with_base_url(token(None), TIMEOUT, server.uri())
        .unwrap();
    let err = provider
      .create_txt_record("_acme-challenge.example.org", "digest")
      .await
      .unwrap_err();
    assert!(matches!(err, DnsProviderError::ZoneNotFound(_)));
  }

  #[tokio::test]
  async fn api_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/zones/zone123/dns_records"))
      .respond_with(ResponseTemplate::new(403).set_body_json(json!({
        "success": false,
        "errors": [{ "code": 10000, "message": "Authentication error" }],
        "result": null
      })))
      .expect(1)
      .mount(&server)
      .await;

    let provider =
      CloudflareProvider::with_base_url(token(Some("zone123")), TIMEOUT, server.uri())
        .unwrap();
    let err = provider
      .create_txt_record("_acme-challenge.example.com", "digest")
      .await
      .unwrap_err();

    assert!(matches!(err, DnsProviderError::Api { status: 403, .. }));
    assert!(err.to_string().contains("Authentication error"));
  }

  #[tokio::test]
  async fn global_key_sends_email_and_key_headers() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/zones/zone123/dns_records/record-1"))
      .and(header("x-auth-email", "ops@example.com"))
      .and(header("x-auth-key", "global-key"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "result": { "id": "record-1" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let provider = CloudflareProvider::with_base_url(
      CloudflareAuth::GlobalKey {
        email: "ops@example.com".to_string(),
        api_key: "global-key".to_string(),
        zone_id: Some("zone123".to_string()),
      },
      TIMEOUT,
      server.uri(),
    )
    .unwrap();
    provider
      .delete_txt_record(&DnsRecord {
        record_id: "record-1".to_string(),
        name: "_acme-challenge.example.com".to_string(),
        zone: None,
      })
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn deleting_a_missing_record_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/zones/zone123/dns_records/gone"))
      .respond_with(ResponseTemplate::new(404))
      .expect(1)
      .mount(&server)
      .await;

    let provider =
      CloudflareProvider::with_base_url(token(None), TIMEOUT, server.uri())
        .unwrap();
    provider
      .delete_txt_record(&DnsRecord {
        record_id: "gone".to_string(),
        name: "_acme-challenge.example.com".to_string(),
        zone: Some("zone123".to_string()),
      })
      .await
      .unwrap();
  }
}

mod webhook {
  use super::*;

  fn provider(server: &MockServer) -> WebhookProvider {
    let mut headers = HashMap::new();
    headers.insert("X-Api-Key".to_string(), "hook-secret".to_string());
    WebhookProvider::new(
      format!("{}/records", server.uri()),
      format!("{}/records/{{record_id}}", server.uri()),
      &headers,
      TIMEOUT,
    )
    .unwrap()
  }

  #[tokio::test]
  async fn creates_record_with_custom_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/records"))
      .and(header("x-api-key", "hook-secret"))
      .and(body_partial_json(json!({
        "type": "TXT",
        "name": "_acme-challenge.example.com",
        "content": "digest",
      })))
      .respond_with(
        ResponseTemplate::new(201).set_body_json(json!({ "id": "hook-1" })),
      )
      .expect(1)
      .mount(&server)
      .await;

    let record = provider(&server)
      .create_txt_record("_acme-challenge.example.com", "digest")
      .await
      .unwrap();
    assert_eq!(record.record_id, "hook-1");
    assert_eq!(record.zone, None);
  }

  #[tokio::test]
  async fn create_failure_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/records"))
      .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
      .mount(&server)
      .await;

    let err = provider(&server)
      .create_txt_record("_acme-challenge.example.com", "digest")
      .await
      .unwrap_err();
    assert!(
      matches!(err, DnsProviderError::Api { status: 500, ref message } if message == "boom")
    );
  }

  #[tokio::test]
  async fn delete_substitutes_record_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/records/hook-1"))
      .and(header("x-api-key", "hook-secret"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    provider(&server)
      .delete_txt_record(&DnsRecord {
        record_id: "hook-1".to_string(),
        name: "_acme-challenge.example.com".to_string(),
        zone: None,
      })
      .await
      .unwrap();
  }
}
