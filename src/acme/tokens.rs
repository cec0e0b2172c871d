use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

/// Pending HTTP-01 responses, keyed by challenge token.
///
/// The ACME client registers a key authorization for the duration of a
/// validation. An HTTP server answering
/// `/.well-known/acme-challenge/{token}` serves them through
/// [`HttpTokens::get`].
#[derive(Clone, Debug, Default)]
pub struct HttpTokens {
  inner: Arc<RwLock<HashMap<String, String>>>,
}

impl HttpTokens {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, token: &str) -> Option<String> {
    let tokens = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    tokens.get(token).cloned()
  }

  /// Serves `key_authorization` for `token` until the returned
  /// registration is dropped.
  pub(crate) fn register(
    &self,
    token: String,
    key_authorization: String,
  ) -> TokenRegistration {
    self
      .inner
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(token.clone(), key_authorization);
    TokenRegistration {
      tokens: self.clone(),
      token,
    }
  }

  fn remove(&self, token: &str) {
    self
      .inner
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(token);
  }

  pub fn is_empty(&self) -> bool {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .is_empty()
  }
}

/// Removes its token from the registry on drop, including when the
/// validation future is dropped mid-flight.
#[derive(Debug)]
pub(crate) struct TokenRegistration {
  tokens: HttpTokens,
  token: String,
}

impl Drop for TokenRegistration {
  fn drop(&mut self) {
    self.tokens.remove(&self.token);
  }
}
