use super::directory::Directory;
use super::error::*;
use super::jws::check_account_key;
use super::jws::Jwk;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::field;
use tracing::instrument;
use tracing::Level;
use tracing::Span;

/// The status of an [`Account`].
///
/// Possible values are "valid", "deactivated",
/// and "revoked". The value "deactivated" should be used to indicate client-
/// initiated deactivation whereas "revoked" should be used to indicate server-
/// initiated deactivation.
#[derive(Deserialize, Eq, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum AccountStatus {
  Valid,
  Deactivated,
  Revoked,
}

/// An account key parsed from PEM, checked to be usable for request
/// signing.
#[derive(Clone, Debug)]
pub struct AccountKey(PKey<Private>);

impl AccountKey {
  pub fn from_pem(pem: &str) -> Result<Self, ProtocolError> {
    let pkey = PKey::private_key_from_pem(pem.as_bytes())?;
    check_account_key(&pkey)?;
    Ok(AccountKey(pkey))
  }

  pub(crate) fn pkey(&self) -> &PKey<Private> {
    &self.0
  }
}

/// An ACME account registered at (or found on) the server.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Account {
  #[serde(skip)]
  pub(crate) directory: Option<Arc<Directory>>,

  #[serde(skip)]
  pub(crate) private_key: Option<PKey<Private>>,

  /// The account URL, used as the JWS key id.
  #[serde(skip)]
  pub id: String,

  /// The status of this account.
  pub status: AccountStatus,
  /// An array of URLs that the server can use to contact the client for
  /// issues related to this account.
  pub contact: Option<Vec<String>>,
}

impl Account {
  /// Creates the account for `key`, or returns the existing one if the
  /// server has seen the key before.
  #[instrument(level = Level::INFO, name = "acme::Account::find_or_register", err, skip(directory, key), fields(account_id = field::Empty))]
  pub async fn find_or_register(
    directory: Arc<Directory>,
    email: &str,
    key: &AccountKey,
  ) -> Result<Arc<Account>, ProtocolError> {
    let contact = if email.is_empty() {
      vec![]
    } else {
      vec![format!("mailto:{}", email)]
    };

    let url = directory.new_account_url.clone();
    let (res, headers) = directory
      .authenticated_request::<_, Account>(
        &url,
        json!({
          "contact": contact,
          "termsOfServiceAgreed": true,
        }),
        key.pkey(),
        None,
      )
      .await?;
    let res: Result<Account, ProtocolError> = res.into();
    let mut acc = res?;

    if acc.status != AccountStatus::Valid {
      return Err(validation_err(format!(
        "account is {:?}",
        acc.status
      )));
    }

    let account_id = map_transport_err(
      headers
        .get(reqwest::header::LOCATION)
        .ok_or_else(|| {
          transport_err("mandatory location header in newAccount not present")
        })?
        .to_str(),
    )?
    .to_string();
    Span::current().record("account_id", &field::display(&account_id));

    acc.directory = Some(directory);
    acc.private_key = Some(key.pkey().clone());
    acc.id = account_id;
    Ok(Arc::new(acc))
  }

  pub(crate) fn directory(&self) -> Result<&Arc<Directory>, ProtocolError> {
    self
      .directory
      .as_ref()
      .ok_or_else(|| validation_err("account has no directory"))
  }

  pub(crate) fn key(&self) -> Result<&PKey<Private>, ProtocolError> {
    self
      .private_key
      .as_ref()
      .ok_or_else(|| validation_err("account has no private key"))
  }

  /// The key authorization for a challenge token.
  pub(crate) fn key_authorization(
    &self,
    token: &str,
  ) -> Result<String, ProtocolError> {
    let thumbprint = Jwk::new(self.key()?)?.thumbprint()?;
    Ok(format!("{}.{}", token, thumbprint))
  }

  /// Signs and posts `payload` with this account's key id.
  pub(crate) async fn request<T, R>(
    &self,
    url: &str,
    payload: T,
  ) -> Result<(R, reqwest::header::HeaderMap), ProtocolError>
  where
    T: serde::Serialize,
    R: serde::de::DeserializeOwned,
  {
    let (res, headers) = self
      .directory()?
      .authenticated_request::<_, R>(
        url,
        payload,
        self.key()?,
        Some(self.id.as_str()),
      )
      .await?;
    let res: Result<R, ProtocolError> = res.into();
    Ok((res?, headers))
  }
}
