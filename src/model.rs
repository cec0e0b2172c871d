use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// An ACME account. The email and private key identify the subscriber to
/// the CA.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcmeAccount {
  pub id: u64,
  pub email: String,
  /// PEM encoded account key (RSA or P-256).
  pub private_key: String,
}

/// Credentials for a DNS provider API.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsProviderAccount {
  pub id: u64,
  pub name: String,
  /// The provider identifier, e.g. `CloudFlare`.
  pub r#type: String,
  /// Opaque provider credentials, JSON encoded.
  pub authorization: String,
}

/// How the domains of a certificate order are validated.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
  /// DNS-01 completed through a stored DNS provider account.
  DnsAccount,
  /// HTTP-01.
  Http,
  /// DNS-01 with TXT records published by an operator.
  DnsManual,
}

/// A certificate issued through an ACME order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateOrder {
  pub id: u64,
  pub acme_account_id: u64,
  /// Set if and only if `provider` is [`ProviderKind::DnsAccount`].
  pub dns_account_id: Option<u64>,
  pub provider: ProviderKind,
  pub primary_domain: String,
  #[serde(with = "comma_list")]
  pub other_domains: Vec<String>,
  pub private_key: String,
  pub certificate_pem: String,
  /// The CA order URL, needed for renewal.
  pub cert_order_url: String,
  pub not_before: DateTime<Utc>,
  pub not_after: DateTime<Utc>,
  pub issuer_common_name: String,
  pub issuer_organization: String,
}

impl CertificateOrder {
  /// The primary domain followed by the other domains.
  pub fn all_domains(&self) -> Vec<String> {
    std::iter::once(self.primary_domain.clone())
      .chain(self.other_domains.iter().cloned())
      .collect()
  }

  /// Whether the certificate expires within `window` of `now`. Renewal
  /// itself is left to the caller.
  pub fn needs_renewal(
    &self,
    now: DateTime<Utc>,
    window: chrono::Duration,
  ) -> bool {
    self.not_after - now <= window
  }
}

/// A request to issue a new certificate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificate {
  pub acme_account_id: u64,
  pub provider: ProviderKind,
  #[serde(default)]
  pub dns_account_id: Option<u64>,
  pub primary_domain: String,
  /// Newline delimited, may be empty.
  #[serde(default)]
  pub other_domains: String,
}

/// A request for the TXT record of a manual DNS challenge.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDnsRequest {
  pub acme_account_id: u64,
  pub domains: Vec<String>,
}

/// The TXT record an operator has to publish before a manual DNS order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDnsRecord {
  pub record_name: String,
  pub record_value: String,
  pub record_type: String,
}

/// The raw materials returned by the CA for an order.
#[derive(Clone, Debug)]
pub struct IssuedCertificate {
  /// PEM encoded private key of the certificate.
  pub private_key: String,
  /// PEM encoded certificate chain, leaf first.
  pub certificate_pem: String,
  pub order_url: String,
}

/// A computed DNS-01 record, as returned by the ACME client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManualDnsChallenge {
  pub record_name: String,
  pub record_value: String,
}

mod comma_list {
  use serde::Deserialize;
  use serde::Deserializer;
  use serde::Serializer;

  pub fn serialize<S>(list: &[String], serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&list.join(","))
  }

  pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
  where
    D: Deserializer<'de>,
  {
    let raw = String::deserialize(deserializer)?;
    Ok(
      raw
        .split(',')
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect(),
    )
  }
}
