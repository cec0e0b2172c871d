//! A Tokio and OpenSSL based ACMEv2 client implementing [`AcmeClient`].
//!
//! Domains are validated with one of:
//!
//! - HTTP-01, the default, with the key authorization registered in
//!   [`HttpTokens`] while the CA validates.
//! - DNS-01 through a DNS provider configured with [`AcmeClient::use_dns`].
//!   The TXT record is deleted once the CA is done with it.
//! - DNS-01 against TXT records the operator already published, after
//!   [`AcmeClient::use_manual_dns_validation`]. The record values come from
//!   [`AcmeClient::use_manual_dns`].

mod account;
mod authorization;
mod directory;
mod error;
mod jws;
mod order;
mod tokens;

pub use account::*;
pub use authorization::*;
pub use directory::*;
pub use error::ProtocolError;
pub use error::ServerError;
pub use order::*;
pub use tokens::HttpTokens;

use crate::client::AcmeClient;
use crate::client::AcmeClientFactory;
use crate::config::CertificateKey;
use crate::config::Config;
use crate::dns::provider_from_account;
use crate::dns::DnsProvider;
use crate::dns::DnsProviderError;
use crate::dns::DnsRecord;
use crate::domains::normalize_domains;
use crate::error::Error;
use crate::model::IssuedCertificate;
use crate::model::ManualDnsChallenge;
use async_trait::async_trait;
use error::validation_err;
use openssl::ec::EcGroup;
use openssl::ec::EcKey;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use openssl::rsa::Rsa;
use std::sync::Arc;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use tracing::Level;

impl From<DnsProviderError> for ProtocolError {
  fn from(err: DnsProviderError) -> Self {
    ProtocolError::Other(Box::new(err))
  }
}

/// Generate a new RSA private key using the specified size,
/// using the system random.
pub fn gen_rsa_private_key(bits: u32) -> Result<PKey<Private>, ProtocolError> {
  let rsa = Rsa::generate(bits)?;
  Ok(PKey::from_rsa(rsa)?)
}

/// Generate a new P-256 private key using the system random.
pub fn gen_ec_p256_private_key() -> Result<PKey<Private>, ProtocolError> {
  let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
  Ok(PKey::from_ec_key(EcKey::generate(&group)?)?)
}

fn gen_certificate_key(
  kind: CertificateKey,
) -> Result<PKey<Private>, ProtocolError> {
  match kind {
    CertificateKey::Rsa2048 => gen_rsa_private_key(2048),
    CertificateKey::Rsa4096 => gen_rsa_private_key(4096),
    CertificateKey::Ec256 => gen_ec_p256_private_key(),
  }
}

/// Builds an [`Acme2Client`] per account, sharing one HTTP client and one
/// [`HttpTokens`] registry.
#[derive(Clone, Debug)]
pub struct Acme2ClientFactory {
  config: Config,
  http_client: reqwest::Client,
  tokens: HttpTokens,
}

impl Acme2ClientFactory {
  pub fn new(config: Config) -> Result<Self, Error> {
    let http_client = reqwest::Client::builder()
      .timeout(config.http_timeout())
      .build()
      .map_err(Error::client_init)?;
    Ok(Self::with_http_client(config, http_client))
  }

  /// Uses `http_client` for every request to the CA, e.g. one trusting a
  /// test CA root.
  pub fn with_http_client(config: Config, http_client: reqwest::Client) -> Self {
    Acme2ClientFactory {
      config,
      http_client,
      tokens: HttpTokens::new(),
    }
  }

  pub fn http_tokens(&self) -> &HttpTokens {
    &self.tokens
  }

  /// Builds the concrete client for an account.
  pub fn client(
    &self,
    email: &str,
    private_key: &str,
  ) -> Result<Acme2Client, Error> {
    let key = AccountKey::from_pem(private_key).map_err(Error::client_init)?;
    Ok(Acme2Client {
      config: self.config.clone(),
      http_client: self.http_client.clone(),
      tokens: self.tokens.clone(),
      email: email.to_string(),
      key,
      account: None,
      validation: Validation::default(),
    })
  }
}

impl AcmeClientFactory for Acme2ClientFactory {
  fn new_client(
    &self,
    email: &str,
    private_key: &str,
  ) -> Result<Box<dyn AcmeClient>, Error> {
    Ok(Box::new(self.client(email, private_key)?))
  }
}

/// An ACME client for one account. The account is registered (or looked
/// up) on the first request to the CA.
#[derive(Debug)]
pub struct Acme2Client {
  config: Config,
  http_client: reqwest::Client,
  tokens: HttpTokens,
  email: String,
  key: AccountKey,
  account: Option<Arc<Account>>,
  validation: Validation,
}

/// How the client answers the challenges of pending authorizations.
#[derive(Debug, Default)]
enum Validation {
  #[default]
  Http,
  DnsProvider(Arc<dyn DnsProvider>),
  ManualDns,
}

/// Deletes a challenge TXT record. If dropped before [`TxtRecordCleanup::run`]
/// completed, the deletion is spawned onto the current runtime instead.
struct TxtRecordCleanup {
  provider: Arc<dyn DnsProvider>,
  record: Option<DnsRecord>,
}

impl TxtRecordCleanup {
  async fn run(mut self) {
    if let Some(record) = self.record.take() {
      delete_txt_record(self.provider.as_ref(), &record).await;
    }
  }
}

impl Drop for TxtRecordCleanup {
  fn drop(&mut self) {
    let Some(record) = self.record.take() else {
      return;
    };
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        let provider = self.provider.clone();
        handle.spawn(async move {
          delete_txt_record(provider.as_ref(), &record).await;
        });
      }
      Err(_) => {
        warn!(name = %record.name, "No runtime left to clean up challenge record")
      }
    }
  }
}

async fn delete_txt_record(provider: &dyn DnsProvider, record: &DnsRecord) {
  if let Err(err) = provider.delete_txt_record(record).await {
    warn!(name = %record.name, error = %err, "Failed to clean up challenge record");
  }
}

fn order_failed(order: &Order) -> ProtocolError {
  match &order.error {
    Some(err) => err.clone().into(),
    None => validation_err(format!("order is {:?}", order.status)),
  }
}

fn challenge_failed(challenge: &Challenge, domain: &str) -> ProtocolError {
  match &challenge.error {
    Some(err) => err.clone().into(),
    None => validation_err(format!(
      "{} challenge for {} is {:?}",
      challenge.typ, domain, challenge.status
    )),
  }
}

fn dns_challenge(
  authorization: &Authorization,
) -> Result<Challenge, ProtocolError> {
  authorization.get_challenge("dns-01").ok_or_else(|| {
    validation_err(format!(
      "no dns-01 challenge offered for {}",
      authorization.identifier.value
    ))
  })
}

fn dns_identifiers(domains: &[String]) -> Result<Vec<Identifier>, ProtocolError> {
  let identifiers = normalize_domains(domains.iter().map(String::as_str))
    .into_iter()
    .map(Identifier::dns)
    .collect::<Vec<_>>();
  if identifiers.is_empty() {
    return Err(validation_err("at least one domain name is required"));
  }
  Ok(identifiers)
}

impl Acme2Client {
  async fn account(&mut self) -> Result<Arc<Account>, ProtocolError> {
    if let Some(account) = &self.account {
      return Ok(account.clone());
    }
    let directory =
      Directory::fetch(self.http_client.clone(), &self.config.directory_url)
        .await?;
    let account =
      Account::find_or_register(directory, &self.email, &self.key).await?;
    self.account = Some(account.clone());
    Ok(account)
  }

  /// Runs a challenge through validation and waits for the result.
  async fn validate(
    &self,
    challenge: &Challenge,
    domain: &str,
  ) -> Result<(), ProtocolError> {
    let challenge = challenge
      .validate()
      .await?
      .wait_done(self.config.poll_interval(), self.config.poll_attempts)
      .await?;
    if challenge.status != ChallengeStatus::Valid {
      return Err(challenge_failed(&challenge, domain));
    }
    Ok(())
  }

  async fn solve_http(
    &self,
    authorization: &Authorization,
    challenge: Challenge,
  ) -> Result<(), ProtocolError> {
    let domain = &authorization.identifier.value;
    let token = challenge
      .token
      .clone()
      .ok_or_else(|| validation_err("http-01 challenge has no token"))?;
    let _registration =
      self.tokens.register(token, challenge.key_authorization()?);
    self.validate(&challenge, domain).await
  }

  async fn solve_dns(
    &self,
    provider: &Arc<dyn DnsProvider>,
    authorization: &Authorization,
  ) -> Result<(), ProtocolError> {
    let domain = &authorization.identifier.value;
    let challenge = dns_challenge(authorization)?;
    let name = dns_record_name(domain);
    let record = provider
      .create_txt_record(&name, &challenge.key_authorization_encoded()?)
      .await?;
    let cleanup = TxtRecordCleanup {
      provider: provider.clone(),
      record: Some(record),
    };

    let delay = self
      .config
      .dns_propagation_delay()
      .unwrap_or_else(|| provider.propagation_delay());
    debug!(provider = provider.name(), delay = ?delay, "Waiting for DNS propagation");
    tokio::time::sleep(delay).await;

    let res = self.validate(&challenge, domain).await;
    cleanup.run().await;
    res
  }

  #[instrument(level = Level::INFO, name = "acme::Acme2Client::authorize", err, skip(self, order), fields(order = %order.url()))]
  async fn authorize(&self, order: &Order) -> Result<(), ProtocolError> {
    for authorization in order.authorizations().await? {
      let domain = authorization.identifier.value.clone();
      match &authorization.status {
        AuthorizationStatus::Valid => continue,
        AuthorizationStatus::Pending => {}
        status => {
          return Err(validation_err(format!(
            "authorization for {} is {:?}",
            domain, status
          )))
        }
      }

      match &self.validation {
        Validation::DnsProvider(provider) => {
          info!(domain = %domain, provider = provider.name(), "Solving dns-01 challenge");
          self.solve_dns(provider, &authorization).await?;
        }
        Validation::ManualDns => {
          info!(domain = %domain, "Validating manually published dns-01 record");
          let challenge = dns_challenge(&authorization)?;
          self.validate(&challenge, &domain).await?;
        }
        Validation::Http => {
          let challenge =
            authorization.get_challenge("http-01").ok_or_else(|| {
              validation_err(format!(
                "no http-01 challenge offered for {}",
                domain
              ))
            })?;
          info!(domain = %domain, "Solving http-01 challenge");
          self.solve_http(&authorization, challenge).await?;
        }
      }

      let authorization = authorization
        .wait_done(self.config.poll_interval(), self.config.poll_attempts)
        .await?;
      if authorization.status != AuthorizationStatus::Valid {
        return Err(validation_err(format!(
          "authorization for {} is {:?}",
          domain, authorization.status
        )));
      }
    }
    Ok(())
  }

  async fn issue(
    &mut self,
    identifiers: Vec<Identifier>,
  ) -> Result<IssuedCertificate, ProtocolError> {
    let account = self.account().await?;
    let order = Order::create(account, identifiers).await?;
    self.authorize(&order).await?;

    let poll_interval = self.config.poll_interval();
    let attempts = self.config.poll_attempts;
    let order = order.wait_ready(poll_interval, attempts).await?;
    if order.status != OrderStatus::Ready {
      return Err(order_failed(&order));
    }

    let pkey = gen_certificate_key(self.config.certificate_key)?;
    let order = order
      .finalize(&pkey)
      .await?
      .wait_done(poll_interval, attempts)
      .await?;
    if order.status != OrderStatus::Valid {
      return Err(order_failed(&order));
    }

    let certificate_pem = order
      .certificate()
      .await?
      .ok_or_else(|| validation_err("valid order has no certificate"))?;
    let private_key = map_utf8(pkey.private_key_to_pem_pkcs8()?)?;

    Ok(IssuedCertificate {
      private_key,
      certificate_pem,
      order_url: order.url().to_string(),
    })
  }
}

fn map_utf8(bytes: Vec<u8>) -> Result<String, ProtocolError> {
  error::map_transport_err(String::from_utf8(bytes))
}

#[async_trait]
impl AcmeClient for Acme2Client {
  fn use_dns(
    &mut self,
    provider_type: &str,
    authorization: &str,
  ) -> Result<(), Error> {
    let provider = provider_from_account(
      provider_type,
      authorization,
      self.config.http_timeout(),
    )
    .map_err(Error::challenge_setup)?;
    self.validation = Validation::DnsProvider(Arc::from(provider));
    Ok(())
  }

  fn use_manual_dns_validation(&mut self) {
    self.validation = Validation::ManualDns;
  }

  #[instrument(level = Level::INFO, name = "acme::Acme2Client::obtain", err, skip(self))]
  async fn obtain(
    &mut self,
    domains: &[String],
  ) -> Result<IssuedCertificate, Error> {
    let identifiers = dns_identifiers(domains).map_err(Error::order)?;
    self.issue(identifiers).await.map_err(Error::order)
  }

  #[instrument(level = Level::INFO, name = "acme::Acme2Client::renew", err, skip(self))]
  async fn renew(
    &mut self,
    order_url: &str,
  ) -> Result<IssuedCertificate, Error> {
    let account = self.account().await.map_err(Error::renew)?;
    let previous = Order::fetch(account, order_url)
      .await
      .map_err(Error::renew)?;
    if previous.status == OrderStatus::Invalid {
      return Err(Error::renew(order_failed(&previous)));
    }
    if previous.identifiers.is_empty() {
      return Err(Error::renew(validation_err("order has no identifiers")));
    }

    self.issue(previous.identifiers).await.map_err(Error::renew)
  }

  /// Places an order and returns the dns-01 record of the first domain.
  /// The order is left pending; the CA reuses its authorization when the
  /// certificate is ordered after the record was published.
  #[instrument(level = Level::INFO, name = "acme::Acme2Client::use_manual_dns", err, skip(self))]
  async fn use_manual_dns(
    &mut self,
    domains: &[String],
  ) -> Result<ManualDnsChallenge, Error> {
    let identifiers = dns_identifiers(domains).map_err(Error::challenge_setup)?;
    let primary = identifiers[0].value.clone();
    let base = primary.strip_prefix("*.").unwrap_or(&primary).to_string();

    let account = self.account().await.map_err(Error::challenge_setup)?;
    let order = Order::create(account, identifiers)
      .await
      .map_err(Error::challenge_setup)?;
    let authorizations =
      order.authorizations().await.map_err(Error::challenge_setup)?;

    let authorization = authorizations
      .iter()
      .find(|a| a.identifier.value == base)
      .or_else(|| authorizations.first())
      .ok_or_else(|| {
        Error::challenge_setup(validation_err("order has no authorizations"))
      })?;
    let challenge =
      dns_challenge(authorization).map_err(Error::challenge_setup)?;

    Ok(ManualDnsChallenge {
      record_name: dns_record_name(&primary),
      record_value: challenge
        .key_authorization_encoded()
        .map_err(Error::challenge_setup)?,
    })
  }
}
