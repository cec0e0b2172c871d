use std::fmt;

/// Boxed error source carried by the [`Error`] variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of record a lookup failed for.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Entity {
  AcmeAccount,
  DnsAccount,
  CertificateOrder,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Entity::AcmeAccount => f.write_str("acme account"),
      Entity::DnsAccount => f.write_str("dns account"),
      Entity::CertificateOrder => f.write_str("certificate order"),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A referenced account, DNS provider account or certificate order does
  /// not exist.
  #[error("{entity} {id} not found")]
  NotFound { entity: Entity, id: u64 },

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// The ACME account key material could not be used to build a client.
  #[error("failed to initialize acme client: {0}")]
  ClientInit(#[source] BoxError),

  /// The DNS provider rejected its configuration, or the manual DNS
  /// challenge could not be computed.
  #[error("challenge setup failed: {0}")]
  ChallengeSetup(#[source] BoxError),

  /// The CA rejected the new order.
  #[error("certificate order failed: {0}")]
  Order(#[source] BoxError),

  /// The CA rejected renewal of a stored order handle.
  #[error("certificate renewal failed: {0}")]
  Renew(#[source] BoxError),

  #[error("failed to parse certificate: {0}")]
  CertParse(#[source] BoxError),

  #[error("repository error: {0}")]
  Repository(#[source] BoxError),

  #[error("the operation was cancelled")]
  Cancelled,

  #[error("the operation deadline was exceeded")]
  DeadlineExceeded,
}

impl Error {
  pub fn not_found(entity: Entity, id: u64) -> Self {
    Error::NotFound { entity, id }
  }

  pub fn client_init<E: Into<BoxError>>(err: E) -> Self {
    Error::ClientInit(err.into())
  }

  pub fn challenge_setup<E: Into<BoxError>>(err: E) -> Self {
    Error::ChallengeSetup(err.into())
  }

  pub fn order<E: Into<BoxError>>(err: E) -> Self {
    Error::Order(err.into())
  }

  pub fn renew<E: Into<BoxError>>(err: E) -> Self {
    Error::Renew(err.into())
  }

  pub fn cert_parse<E: Into<BoxError>>(err: E) -> Self {
    Error::CertParse(err.into())
  }

  pub fn repository<E: Into<BoxError>>(err: E) -> Self {
    Error::Repository(err.into())
  }

  /// Whether this error reports a missing record.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::NotFound { .. })
  }
}
