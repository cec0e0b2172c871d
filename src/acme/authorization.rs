use super::account::Account;
use super::error::*;
use super::jws::b64;
use super::order::Identifier;
use super::order::Order;
use openssl::hash::hash;
use openssl::hash::MessageDigest;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::field;
use tracing::instrument;
use tracing::Level;
use tracing::Span;

#[derive(Deserialize, Debug, Eq, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
/// The status of this authorization. Possible values are "pending",
/// "valid", "invalid", "deactivated", "expired", and "revoked".
pub enum AuthorizationStatus {
  Pending,
  Valid,
  Invalid,
  Deactivated,
  Expired,
  Revoked,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
/// An ACME authorization object represents a server's authorization
/// for an account to represent an identifier.
pub struct Authorization {
  #[serde(skip)]
  pub(crate) account: Option<Arc<Account>>,
  #[serde(skip)]
  pub(crate) url: String,

  /// The identifier that the account is authorized to represent.
  pub identifier: Identifier,
  /// The status of this authorization.
  pub status: AuthorizationStatus,
  /// The timestamp after which the server will consider this
  /// authorization invalid.
  pub expires: Option<String>,
  /// For pending authorizations, the challenges that the client can
  /// fulfill in order to prove possession of the identifier.
  pub challenges: Vec<Challenge>,
  pub wildcard: Option<bool>,
}

#[derive(Deserialize, Debug, Eq, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
/// The status of this challenge. Possible values are "pending",
/// "processing", "valid", and "invalid".
pub enum ChallengeStatus {
  Pending,
  Processing,
  Valid,
  Invalid,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
  #[serde(skip)]
  pub(crate) account: Option<Arc<Account>>,

  #[serde(rename = "type")]
  /// The type of challenge encoded in the object.
  pub typ: String,
  /// The URL to which a response can be posted.
  pub(crate) url: String,
  /// The status of this challenge.
  pub status: ChallengeStatus,
  /// The time at which the server validated this challenge.
  pub validated: Option<String>,

  /// Error that occurred while the server was validating the
  /// challenge, if any.
  pub error: Option<ServerError>,

  /// A random value that uniquely identifies the challenge.
  pub token: Option<String>,
}

/// The TXT record name for a DNS-01 challenge on `domain`.
pub fn dns_record_name(domain: &str) -> String {
  let domain = domain.strip_prefix("*.").unwrap_or(domain);
  format!("_acme-challenge.{}", domain)
}

/// The TXT record value for a key authorization:
/// `base64url(sha256(key_authorization))`.
pub fn dns_record_value(
  key_authorization: &str,
) -> Result<String, ProtocolError> {
  Ok(b64(&hash(
    MessageDigest::sha256(),
    key_authorization.as_bytes(),
  )?))
}

impl Order {
  #[instrument(level = Level::INFO, name = "acme::Order::authorizations", err, skip(self), fields(order = %self.url, authorization_urls = ?self.authorization_urls))]
  pub async fn authorizations(
    &self,
  ) -> Result<Vec<Authorization>, ProtocolError> {
    let account = self.account()?.clone();
    let mut authorizations = vec![];

    for authorization_url in &self.authorization_urls {
      authorizations
        .push(Authorization::fetch(account.clone(), authorization_url).await?);
    }

    Ok(authorizations)
  }
}

impl Authorization {
  async fn fetch(
    account: Arc<Account>,
    url: &str,
  ) -> Result<Authorization, ProtocolError> {
    let (mut authorization, _) =
      account.request::<_, Authorization>(url, "").await?;
    authorization.url = url.to_string();
    for challenge in &mut authorization.challenges {
      challenge.account = Some(account.clone());
    }
    authorization.account = Some(account);
    Ok(authorization)
  }

  pub fn get_challenge(&self, typ: &str) -> Option<Challenge> {
    self.challenges.iter().find(|c| c.typ == typ).cloned()
  }

  #[instrument(level = Level::DEBUG, name = "acme::Authorization::poll", err, skip(self), fields(url = ?self.url, status = field::Empty))]
  pub async fn poll(&self) -> Result<Authorization, ProtocolError> {
    let account = self
      .account
      .clone()
      .ok_or_else(|| validation_err("authorization has no account"))?;
    let authorization = Self::fetch(account, &self.url).await?;
    Span::current().record("status", &field::debug(&authorization.status));
    Ok(authorization)
  }

  #[instrument(level = Level::INFO, name = "acme::Authorization::wait_done", err, skip(self), fields(url = ?self.url))]
  pub async fn wait_done(
    self,
    poll_interval: Duration,
    attempts: usize,
  ) -> Result<Authorization, ProtocolError> {
    let mut authorization = self;
    let mut i: usize = 0;

    while authorization.status == AuthorizationStatus::Pending {
      if i >= attempts {
        return Err(ProtocolError::MaxAttemptsExceeded);
      }
      debug!(
        { delay = ?poll_interval },
        "Authorization still pending. Waiting to poll."
      );
      tokio::time::sleep(poll_interval).await;
      authorization = authorization.poll().await?;
      i += 1;
    }

    Ok(authorization)
  }
}

impl Challenge {
  fn account(&self) -> Result<&Arc<Account>, ProtocolError> {
    self
      .account
      .as_ref()
      .ok_or_else(|| validation_err("challenge has no account"))
  }

  fn token(&self) -> Result<&str, ProtocolError> {
    self
      .token
      .as_deref()
      .ok_or_else(|| validation_err("challenge has no token"))
  }

  /// The key authorization for this challenge's token.
  pub fn key_authorization(&self) -> Result<String, ProtocolError> {
    self.account()?.key_authorization(self.token()?)
  }

  /// The value of the TXT record for a DNS-01 challenge.
  pub fn key_authorization_encoded(&self) -> Result<String, ProtocolError> {
    dns_record_value(&self.key_authorization()?)
  }

  /// Tells the server the challenge is ready to be validated.
  #[instrument(level = Level::INFO, name = "acme::Challenge::validate", err, skip(self), fields(url = ?self.url, status = field::Empty))]
  pub async fn validate(&self) -> Result<Challenge, ProtocolError> {
    let account = self.account()?.clone();
    let (mut challenge, _) =
      account.request::<_, Challenge>(&self.url, json!({})).await?;
    challenge.account = Some(account);
    Span::current().record("status", &field::debug(&challenge.status));
    Ok(challenge)
  }

  #[instrument(level = Level::DEBUG, name = "acme::Challenge::poll", err, skip(self), fields(url = ?self.url, status = field::Empty))]
  pub async fn poll(&self) -> Result<Challenge, ProtocolError> {
    let account = self.account()?.clone();
    let (mut challenge, _) =
      account.request::<_, Challenge>(&self.url, "").await?;
    challenge.account = Some(account);
    Span::current().record("status", &field::debug(&challenge.status));
    Ok(challenge)
  }

  #[instrument(level = Level::INFO, name = "acme::Challenge::wait_done", err, skip(self), fields(url = ?self.url))]
  pub async fn wait_done(
    self,
    poll_interval: Duration,
    attempts: usize,
  ) -> Result<Challenge, ProtocolError> {
    let mut challenge = self;
    let mut i: usize = 0;

    while challenge.status == ChallengeStatus::Pending
      || challenge.status == ChallengeStatus::Processing
    {
      if i >= attempts {
        return Err(ProtocolError::MaxAttemptsExceeded);
      }
      debug!(
        { delay = ?poll_interval, status = ?challenge.status },
        "Challenge not done. Waiting to poll."
      );
      tokio::time::sleep(poll_interval).await;
      challenge = challenge.poll().await?;
      i += 1;
    }

    Ok(challenge)
  }
}
