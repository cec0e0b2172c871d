use super::account::Account;
use super::error::*;
use super::jws::b64;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::X509Name;
use openssl::x509::X509Req;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::field;
use tracing::instrument;
use tracing::Level;
use tracing::Span;

/// A resource the ACME server can provision certificates for.
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
  #[serde(rename = "type")]
  pub typ: String,
  pub value: String,
}

impl Identifier {
  pub fn dns(value: impl Into<String>) -> Self {
    Identifier {
      typ: "dns".to_string(),
      value: value.into(),
    }
  }
}

#[derive(Deserialize, Debug, Eq, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
/// The status of this order.  Possible values are "pending", "ready",
/// processing", "valid", and "invalid".
pub enum OrderStatus {
  Pending,
  Ready,
  Processing,
  Valid,
  Invalid,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
/// An ACME order object represents a client's request for a certificate
/// and is used to track the progress of that order through to issuance.
pub struct Order {
  #[serde(skip)]
  pub(crate) account: Option<Arc<Account>>,
  #[serde(skip)]
  pub(crate) url: String,

  /// The status of this order.
  pub status: OrderStatus,
  /// The timestamp after which the server will consider this order
  /// invalid.
  pub expires: Option<String>,
  /// An array of identifier objects that the order pertains to.
  pub identifiers: Vec<Identifier>,

  /// The error that occurred while processing the order, if any.
  pub error: Option<ServerError>,

  #[serde(rename = "authorizations", default)]
  /// The authorizations the client needs to complete before the
  /// certificate can be issued.
  pub(crate) authorization_urls: Vec<String>,
  #[serde(rename = "finalize")]
  /// A URL that a CSR must be POSTed to once all of the order's
  /// authorizations are satisfied to finalize the order.
  pub(crate) finalize_url: String,
  #[serde(rename = "certificate")]
  /// A URL for the certificate that has been issued in response to
  /// this order.
  pub(crate) certificate_url: Option<String>,
}

fn gen_csr(
  pkey: &PKey<Private>,
  domains: &[String],
) -> Result<X509Req, ProtocolError> {
  let first = domains
    .first()
    .ok_or_else(|| validation_err("at least one domain name is required"))?;

  let mut builder = X509Req::builder()?;
  let name = {
    let mut name = X509Name::builder()?;
    name.append_entry_by_text("CN", first)?;
    name.build()
  };
  builder.set_subject_name(&name)?;

  let san_extension = {
    let mut san = SubjectAlternativeName::new();
    for domain in domains {
      san.dns(domain);
    }
    san.build(&builder.x509v3_context(None))?
  };
  let mut stack = Stack::new()?;
  stack.push(san_extension)?;
  builder.add_extensions(&stack)?;

  builder.set_pubkey(pkey)?;
  builder.sign(pkey, MessageDigest::sha256())?;

  Ok(builder.build())
}

impl Order {
  /// Places a new order for `identifiers`.
  #[instrument(level = Level::INFO, name = "acme::Order::create", err, skip(account), fields(order = field::Empty))]
  pub async fn create(
    account: Arc<Account>,
    identifiers: Vec<Identifier>,
  ) -> Result<Order, ProtocolError> {
    let new_order_url = account.directory()?.new_order_url.clone();
    let (mut order, headers) = account
      .request::<_, Order>(
        &new_order_url,
        json!({
          "identifiers": identifiers,
        }),
      )
      .await?;

    let order_url = map_transport_err(
      headers
        .get(reqwest::header::LOCATION)
        .ok_or_else(|| {
          transport_err("mandatory location header in newOrder not present")
        })?
        .to_str(),
    )?
    .to_string();
    Span::current().record("order", &field::display(&order_url));

    order.account = Some(account);
    order.url = order_url;
    Ok(order)
  }

  /// Fetches the order at `url`.
  #[instrument(level = Level::DEBUG, name = "acme::Order::fetch", err, skip(account))]
  pub async fn fetch(
    account: Arc<Account>,
    url: &str,
  ) -> Result<Order, ProtocolError> {
    let (mut order, _) = account.request::<_, Order>(url, "").await?;
    order.account = Some(account);
    order.url = url.to_string();
    Ok(order)
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub(crate) fn account(&self) -> Result<&Arc<Account>, ProtocolError> {
    self
      .account
      .as_ref()
      .ok_or_else(|| validation_err("order has no account"))
  }

  pub async fn poll(&self) -> Result<Order, ProtocolError> {
    Self::fetch(self.account()?.clone(), &self.url).await
  }

  /// Submits a CSR over all identifiers of this order, signed with `pkey`.
  #[instrument(level = Level::INFO, name = "acme::Order::finalize", err, skip(self, pkey), fields(order = %self.url))]
  pub async fn finalize(
    &self,
    pkey: &PKey<Private>,
  ) -> Result<Order, ProtocolError> {
    let domains = self
      .identifiers
      .iter()
      .map(|i| i.value.clone())
      .collect::<Vec<_>>();
    let csr = gen_csr(pkey, &domains)?;
    let csr_b64 = b64(&csr.to_der()?);

    let account = self.account()?.clone();
    let (mut order, _) = account
      .request::<_, Order>(&self.finalize_url, json!({ "csr": csr_b64 }))
      .await?;
    order.account = Some(account);
    order.url = self.url.clone();
    Ok(order)
  }

  /// Downloads the PEM certificate chain, if one has been issued.
  pub async fn certificate(&self) -> Result<Option<String>, ProtocolError> {
    let certificate_url = match &self.certificate_url {
      Some(certificate_url) => certificate_url,
      None => return Ok(None),
    };

    let account = self.account()?;
    let resp = account
      .directory()?
      .authenticated_request_raw(
        certificate_url,
        "",
        account.key()?,
        Some(account.id.as_str()),
      )
      .await?;

    if !resp.status().is_success() {
      let err: ServerError = resp.json().await?;
      return Err(err.into());
    }

    Ok(Some(resp.text().await?))
  }

  async fn wait_while(
    self,
    poll_interval: Duration,
    attempts: usize,
    pending: &[OrderStatus],
  ) -> Result<Order, ProtocolError> {
    let mut order = self;
    let mut i: usize = 0;

    while pending.contains(&order.status) {
      if i >= attempts {
        return Err(ProtocolError::MaxAttemptsExceeded);
      }
      debug!(
        { delay = ?poll_interval, status = ?order.status },
        "Order not ready. Waiting to poll."
      );
      tokio::time::sleep(poll_interval).await;
      order = order.poll().await?;
      i += 1;
    }

    Ok(order)
  }

  /// Polls until the order leaves the `pending` state.
  #[instrument(level = Level::INFO, name = "acme::Order::wait_ready", err, skip(self), fields(order = %self.url))]
  pub async fn wait_ready(
    self,
    poll_interval: Duration,
    attempts: usize,
  ) -> Result<Order, ProtocolError> {
    self
      .wait_while(poll_interval, attempts, &[OrderStatus::Pending])
      .await
  }

  /// Polls until the order is `valid` or `invalid`.
  #[instrument(level = Level::INFO, name = "acme::Order::wait_done", err, skip(self), fields(order = %self.url))]
  pub async fn wait_done(
    self,
    poll_interval: Duration,
    attempts: usize,
  ) -> Result<Order, ProtocolError> {
    self
      .wait_while(
        poll_interval,
        attempts,
        &[
          OrderStatus::Pending,
          OrderStatus::Ready,
          OrderStatus::Processing,
        ],
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use openssl::rsa::Rsa;

  #[test]
  fn csr_covers_all_domains() {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let domains = vec!["example.com".to_string(), "a.example.com".to_string()];
    let csr = gen_csr(&pkey, &domains).unwrap();

    let cn = csr
      .subject_name()
      .entries_by_nid(openssl::nid::Nid::COMMONNAME)
      .next()
      .unwrap()
      .data()
      .as_utf8()
      .unwrap()
      .to_string();
    assert_eq!(cn, "example.com");
    assert!(csr.verify(&pkey).unwrap());
  }

  #[test]
  fn csr_needs_a_domain() {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    assert!(matches!(
      gen_csr(&pkey, &[]),
      Err(ProtocolError::Validation(_))
    ));
  }

  #[test]
  fn deserializes_order() {
    let order: Order = serde_json::from_str(
      r#"{
        "status": "pending",
        "expires": "2026-01-08T00:00:00Z",
        "identifiers": [{ "type": "dns", "value": "example.com" }],
        "authorizations": ["https://ca/authz/1"],
        "finalize": "https://ca/order/1/finalize"
      }"#,
    )
    .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.identifiers, vec![Identifier::dns("example.com")]);
    assert_eq!(order.authorization_urls.len(), 1);
    assert!(order.certificate_url.is_none());
  }
}
