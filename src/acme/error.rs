use serde::Deserialize;

/// Errors raised while talking to the ACME server.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  #[error("the maximum poll attempts have been exceeded")]
  MaxAttemptsExceeded,

  #[error("validation error: {0}")]
  Validation(String),

  #[error(transparent)]
  Server(#[from] ServerError),

  #[error(transparent)]
  Transport(Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Other(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(&'static str);

pub(crate) fn transport_err(msg: &'static str) -> ProtocolError {
  ProtocolError::Transport(Box::new(TransportError(msg)))
}

pub(crate) fn map_transport_err<T, E>(
  res: Result<T, E>,
) -> Result<T, ProtocolError>
where
  E: std::error::Error + Send + Sync + 'static,
{
  res.map_err(|err| ProtocolError::Transport(Box::new(err)))
}

pub(crate) fn validation_err(msg: impl Into<String>) -> ProtocolError {
  ProtocolError::Validation(msg.into())
}

impl From<reqwest::Error> for ProtocolError {
  fn from(err: reqwest::Error) -> Self {
    Self::Transport(Box::new(err))
  }
}

impl From<serde_json::Error> for ProtocolError {
  fn from(err: serde_json::Error) -> Self {
    Self::Transport(Box::new(err))
  }
}

impl From<openssl::error::ErrorStack> for ProtocolError {
  fn from(err: openssl::error::ErrorStack) -> Self {
    Self::Other(Box::new(err))
  }
}

/// The result of an operation that can return a [`ServerError`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", untagged)]
pub(crate) enum ServerResult<T> {
  Ok(T),
  Err(ServerError),
}

impl<T> From<ServerResult<T>> for Result<T, ProtocolError> {
  fn from(res: ServerResult<T>) -> Self {
    match res {
      ServerResult::Ok(t) => Ok(t),
      ServerResult::Err(err) => Err(err.into()),
    }
  }
}

/// A problem document returned by the ACME server.
#[derive(Deserialize, Debug, Clone, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("ServerError({}): {}: {}", r#type.clone().unwrap_or_default(), title.clone().unwrap_or_default(), detail.clone().unwrap_or_default())]
pub struct ServerError {
  /// The type of this error.
  pub r#type: Option<String>,
  /// The human readable title of this error.
  pub title: Option<String>,
  /// The status code of this error.
  pub status: Option<u16>,
  /// The human readable extra description for this error.
  pub detail: Option<String>,
}

impl ServerError {
  pub(crate) fn is_bad_nonce(&self) -> bool {
    self.r#type.as_deref() == Some("urn:ietf:params:acme:error:badNonce")
  }
}
