use super::error::*;
use super::jws::jws;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use tracing::debug;
use tracing::instrument;
use tracing::Level;

/// The directory of an ACME server, plus the HTTP client and nonce pool
/// used for every request made against it.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
  #[serde(skip)]
  pub(crate) http_client: reqwest::Client,
  #[serde(skip)]
  pub(crate) nonce: Mutex<Option<String>>,
  #[serde(rename = "newNonce")]
  pub(crate) new_nonce_url: String,
  #[serde(rename = "newAccount")]
  pub(crate) new_account_url: String,
  #[serde(rename = "newOrder")]
  pub(crate) new_order_url: String,
  pub meta: Option<DirectoryMeta>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMeta {
  pub terms_of_service: Option<String>,
  pub website: Option<String>,
  pub caa_identities: Option<Vec<String>>,
  pub external_account_required: Option<bool>,
}

fn extract_nonce_from_response(
  resp: &reqwest::Response,
) -> Result<Option<String>, ProtocolError> {
  match resp.headers().get("replay-nonce") {
    Some(value) => Ok(Some(map_transport_err(value.to_str())?.to_string())),
    None => Ok(None),
  }
}

impl Directory {
  #[instrument(level = Level::DEBUG, name = "acme::Directory::fetch", err, skip(http_client))]
  pub async fn fetch(
    http_client: reqwest::Client,
    url: &str,
  ) -> Result<Arc<Directory>, ProtocolError> {
    let resp = http_client.get(url).send().await?;

    let res: Result<Directory, ProtocolError> =
      resp.json::<ServerResult<Directory>>().await?.into();
    let mut dir = res?;

    dir.http_client = http_client;
    dir.nonce = Mutex::new(None);

    Ok(Arc::new(dir))
  }

  fn take_nonce(&self) -> Option<String> {
    let mut guard = self.nonce.lock().unwrap_or_else(PoisonError::into_inner);
    guard.take()
  }

  fn store_nonce(&self, nonce: String) {
    let mut guard = self.nonce.lock().unwrap_or_else(PoisonError::into_inner);
    *guard = Some(nonce);
  }

  pub(crate) async fn get_nonce(&self) -> Result<String, ProtocolError> {
    if let Some(nonce) = self.take_nonce() {
      return Ok(nonce);
    }

    let resp = self.http_client.get(&self.new_nonce_url).send().await?;
    extract_nonce_from_response(&resp)?
      .ok_or_else(|| transport_err("newNonce request must return a nonce"))
  }

  pub(crate) async fn authenticated_request_raw(
    &self,
    url: &str,
    payload: &str,
    pkey: &PKey<Private>,
    pkey_id: Option<&str>,
  ) -> Result<reqwest::Response, ProtocolError> {
    let nonce = self.get_nonce().await?;
    let body = jws(url, nonce, payload, pkey, pkey_id)?;
    let resp = self
      .http_client
      .post(url)
      .header(reqwest::header::CONTENT_TYPE, "application/jose+json")
      .body(body)
      .send()
      .await?;

    if let Some(nonce) = extract_nonce_from_response(&resp)? {
      self.store_nonce(nonce);
    }

    Ok(resp)
  }

  /// Signs and posts `payload`, retrying up to three times when the server
  /// rejects the nonce. A payload of `""` is sent as POST-as-GET.
  pub(crate) async fn authenticated_request<T, R>(
    &self,
    url: &str,
    payload: T,
    pkey: &PKey<Private>,
    pkey_id: Option<&str>,
  ) -> Result<(ServerResult<R>, reqwest::header::HeaderMap), ProtocolError>
  where
    T: Serialize,
    R: DeserializeOwned,
  {
    let mut attempt = 0;
    let payload = serde_json::to_string(&payload)?;
    let payload = if payload == "\"\"" {
      "".to_string()
    } else {
      payload
    };

    loop {
      attempt += 1;

      let resp = self
        .authenticated_request_raw(url, &payload, pkey, pkey_id)
        .await?;

      let headers = resp.headers().clone();

      let res: ServerResult<R> = resp.json().await?;

      if let ServerResult::Err(err) = &res {
        if err.is_bad_nonce() && attempt <= 3 {
          debug!({ attempt }, "Server rejected nonce, retrying");
          continue;
        }
      }

      return Ok((res, headers));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserializes_directory_without_optional_urls() {
    let dir: Directory = serde_json::from_str(
      r#"{
        "newNonce": "https://ca/nonce",
        "newAccount": "https://ca/acct",
        "newOrder": "https://ca/order",
        "revokeCert": "https://ca/revoke",
        "meta": { "termsOfService": "https://ca/tos" }
      }"#,
    )
    .unwrap();
    assert_eq!(dir.new_order_url, "https://ca/order");
    assert_eq!(
      dir.meta.unwrap().terms_of_service.as_deref(),
      Some("https://ca/tos")
    );
  }
}
