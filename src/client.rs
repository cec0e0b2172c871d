//! The seam between the certificate service and an ACME client library.

use crate::error::Error;
use crate::model::IssuedCertificate;
use crate::model::ManualDnsChallenge;
use async_trait::async_trait;

/// An ACME client bound to a single account.
///
/// A client is built per service call and never shared between calls.
#[async_trait]
pub trait AcmeClient: Send {
  /// Complete DNS-01 challenges through the given DNS provider.
  ///
  /// Fails with [`Error::ChallengeSetup`] if the provider type is unknown or
  /// the authorization is rejected.
  fn use_dns(
    &mut self,
    provider_type: &str,
    authorization: &str,
  ) -> Result<(), Error>;

  /// Complete DNS-01 challenges against TXT records the operator published
  /// ahead of the order, as computed by [`AcmeClient::use_manual_dns`].
  fn use_manual_dns_validation(&mut self);

  /// Place an order for `domains` and return the issued certificate.
  ///
  /// Fails with [`Error::Order`].
  async fn obtain(
    &mut self,
    domains: &[String],
  ) -> Result<IssuedCertificate, Error>;

  /// Issue a new certificate for the order at `order_url`.
  ///
  /// Fails with [`Error::Renew`].
  async fn renew(&mut self, order_url: &str)
    -> Result<IssuedCertificate, Error>;

  /// Compute the DNS-01 TXT record an operator has to publish for `domains`.
  ///
  /// Fails with [`Error::ChallengeSetup`].
  async fn use_manual_dns(
    &mut self,
    domains: &[String],
  ) -> Result<ManualDnsChallenge, Error>;
}

/// Builds [`AcmeClient`]s from account key material.
pub trait AcmeClientFactory: Send + Sync {
  /// Fails with [`Error::ClientInit`] on malformed key material.
  fn new_client(
    &self,
    email: &str,
    private_key: &str,
  ) -> Result<Box<dyn AcmeClient>, Error>;
}
