use crate::client::AcmeClient;
use crate::error::Error;
use crate::model::DnsProviderAccount;
use crate::model::ProviderKind;
use crate::repository::DnsAccountRepository;
use tracing::debug;

/// The domain validation mechanism of an order, resolved from its
/// [`ProviderKind`] before any ACME client is built.
#[derive(Clone, Debug)]
pub enum ChallengeStrategy {
  DnsAccount(DnsProviderAccount),
  Http,
  DnsManual,
}

impl ChallengeStrategy {
  /// Looks up the DNS provider account for [`ProviderKind::DnsAccount`].
  pub async fn resolve(
    kind: ProviderKind,
    dns_account_id: Option<u64>,
    dns_accounts: &dyn DnsAccountRepository,
  ) -> Result<Self, Error> {
    match kind {
      ProviderKind::DnsAccount => {
        let id = dns_account_id.ok_or_else(|| {
          Error::InvalidRequest(
            "a dns account is required for the dnsAccount provider"
              .to_string(),
          )
        })?;
        let account = dns_accounts.get_by_id(id).await?;
        Ok(ChallengeStrategy::DnsAccount(account))
      }
      ProviderKind::Http => Ok(ChallengeStrategy::Http),
      ProviderKind::DnsManual => Ok(ChallengeStrategy::DnsManual),
    }
  }

  pub fn kind(&self) -> ProviderKind {
    match self {
      ChallengeStrategy::DnsAccount(_) => ProviderKind::DnsAccount,
      ChallengeStrategy::Http => ProviderKind::Http,
      ChallengeStrategy::DnsManual => ProviderKind::DnsManual,
    }
  }

  pub fn dns_account_id(&self) -> Option<u64> {
    match self {
      ChallengeStrategy::DnsAccount(account) => Some(account.id),
      _ => None,
    }
  }

  /// Prepares `client` for domain validation.
  ///
  /// HTTP-01 is the client default. Only the DNS account variant sets up a
  /// DNS provider; the manual variant switches the client to DNS-01 against
  /// records the operator published.
  pub fn configure(&self, client: &mut dyn AcmeClient) -> Result<(), Error> {
    match self {
      ChallengeStrategy::DnsAccount(account) => {
        debug!(
          dns_account_id = account.id,
          provider_type = %account.r#type,
          "Configuring DNS provider for challenges"
        );
        client.use_dns(&account.r#type, &account.authorization)
      }
      ChallengeStrategy::DnsManual => {
        client.use_manual_dns_validation();
        Ok(())
      }
      ChallengeStrategy::Http => Ok(()),
    }
  }
}
