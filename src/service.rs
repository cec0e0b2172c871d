use crate::challenge::ChallengeStrategy;
use crate::client::AcmeClient;
use crate::client::AcmeClientFactory;
use crate::context::CallContext;
use crate::domains::combine_domains;
use crate::domains::normalize_domains;
use crate::domains::split_other_domains;
use crate::error::Error;
use crate::metadata::CertificateMetadata;
use crate::model::AcmeAccount;
use crate::model::CertificateOrder;
use crate::model::CreateCertificate;
use crate::model::ManualDnsRecord;
use crate::model::ManualDnsRequest;
use crate::model::ProviderKind;
use crate::repository::AcmeAccountRepository;
use crate::repository::CertificateOrderRepository;
use crate::repository::DnsAccountRepository;
use std::sync::Arc;
use tracing::debug;
use tracing::error;
use tracing::field;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use tracing::Level;
use tracing::Span;

/// Issues, renews and deletes certificate orders.
///
/// Every call builds its own ACME client from the account key material, so
/// calls for different accounts never share state. Concurrent renewals of
/// the same order are not coordinated here.
#[derive(Clone)]
pub struct CertificateService {
  acme_accounts: Arc<dyn AcmeAccountRepository>,
  dns_accounts: Arc<dyn DnsAccountRepository>,
  orders: Arc<dyn CertificateOrderRepository>,
  clients: Arc<dyn AcmeClientFactory>,
}

impl CertificateService {
  pub fn new(
    acme_accounts: Arc<dyn AcmeAccountRepository>,
    dns_accounts: Arc<dyn DnsAccountRepository>,
    orders: Arc<dyn CertificateOrderRepository>,
    clients: Arc<dyn AcmeClientFactory>,
  ) -> Self {
    CertificateService {
      acme_accounts,
      dns_accounts,
      orders,
      clients,
    }
  }

  fn client_for(
    &self,
    account: &AcmeAccount,
  ) -> Result<Box<dyn AcmeClient>, Error> {
    self.clients.new_client(&account.email, &account.private_key)
  }

  /// Issues a new certificate and stores it as a new order.
  ///
  /// The request is echoed back on success. A certificate issued by the CA
  /// is not revoked if storing the order fails afterwards.
  #[instrument(level = Level::INFO, name = "CertificateService::create", err, skip(self, ctx, request), fields(acme_account_id = request.acme_account_id, provider = ?request.provider, primary_domain = %request.primary_domain, order_id = field::Empty))]
  pub async fn create(
    &self,
    ctx: &CallContext,
    request: CreateCertificate,
  ) -> Result<CreateCertificate, Error> {
    let primary_domain = request.primary_domain.trim();
    if primary_domain.is_empty() {
      return Err(Error::InvalidRequest(
        "primary domain must not be empty".to_string(),
      ));
    }
    if request.provider != ProviderKind::DnsAccount
      && request.dns_account_id.is_some()
    {
      warn!("Ignoring dns account for a non dnsAccount provider");
    }

    let account = self.acme_accounts.get_by_id(request.acme_account_id).await?;
    let strategy = ChallengeStrategy::resolve(
      request.provider,
      request.dns_account_id,
      self.dns_accounts.as_ref(),
    )
    .await?;

    let mut client = self.client_for(&account)?;
    strategy.configure(client.as_mut())?;

    let domains = combine_domains(primary_domain, &request.other_domains);
    debug!(domains = ?domains, "Requesting certificate");
    let issued = ctx.run(client.obtain(&domains)).await?;

    let metadata =
      CertificateMetadata::from_pem(issued.certificate_pem.as_bytes())?;
    info!(
      order_url = %issued.order_url,
      not_after = %metadata.not_after,
      issuer = %metadata.issuer_common_name,
      "Certificate issued"
    );

    let order = CertificateOrder {
      id: 0,
      acme_account_id: account.id,
      dns_account_id: strategy.dns_account_id(),
      provider: strategy.kind(),
      primary_domain: primary_domain.to_string(),
      other_domains: split_other_domains(
        primary_domain,
        &request.other_domains,
      ),
      private_key: issued.private_key,
      certificate_pem: issued.certificate_pem,
      cert_order_url: issued.order_url,
      not_before: metadata.not_before,
      not_after: metadata.not_after,
      issuer_common_name: metadata.issuer_common_name,
      issuer_organization: metadata.issuer_organization,
    };

    let order = self.orders.create(order).await.map_err(|err| {
      error!(
        error = %err,
        "Certificate was issued but the order could not be stored"
      );
      err
    })?;
    Span::current().record("order_id", &order.id);

    Ok(request)
  }

  /// Issues a new certificate for an existing order, reusing the way it
  /// was originally validated, and overwrites the order in place.
  #[instrument(level = Level::INFO, name = "CertificateService::renew", err, skip(self, ctx), fields(provider = field::Empty))]
  pub async fn renew(
    &self,
    ctx: &CallContext,
    order_id: u64,
  ) -> Result<CertificateOrder, Error> {
    let mut order = self.orders.get_by_id(order_id).await?;
    Span::current().record("provider", &field::debug(&order.provider));
    if order.cert_order_url.is_empty() {
      return Err(Error::renew(format!(
        "certificate order {} has no CA order url",
        order_id
      )));
    }

    let account = self.acme_accounts.get_by_id(order.acme_account_id).await?;
    let strategy = ChallengeStrategy::resolve(
      order.provider,
      order.dns_account_id,
      self.dns_accounts.as_ref(),
    )
    .await?;

    let mut client = self.client_for(&account)?;
    strategy.configure(client.as_mut())?;

    let issued = ctx.run(client.renew(&order.cert_order_url)).await?;
    let metadata =
      CertificateMetadata::from_pem(issued.certificate_pem.as_bytes())?;
    info!(
      order_url = %issued.order_url,
      not_after = %metadata.not_after,
      "Certificate renewed"
    );

    order.private_key = issued.private_key;
    order.certificate_pem = issued.certificate_pem;
    order.cert_order_url = issued.order_url;
    order.not_before = metadata.not_before;
    order.not_after = metadata.not_after;
    order.issuer_common_name = metadata.issuer_common_name;
    order.issuer_organization = metadata.issuer_organization;

    self.orders.save(&order).await.map_err(|err| {
      error!(
        error = %err,
        "Certificate was renewed but the order could not be stored"
      );
      err
    })?;

    Ok(order)
  }

  /// Computes the TXT record to publish for a manual DNS order. Nothing is
  /// stored.
  #[instrument(level = Level::INFO, name = "CertificateService::manual_dns_record", err, skip(self, ctx, request), fields(acme_account_id = request.acme_account_id, domains = ?request.domains))]
  pub async fn manual_dns_record(
    &self,
    ctx: &CallContext,
    request: ManualDnsRequest,
  ) -> Result<ManualDnsRecord, Error> {
    let domains = normalize_domains(request.domains.iter().map(String::as_str));
    if domains.is_empty() {
      return Err(Error::InvalidRequest(
        "at least one domain is required".to_string(),
      ));
    }

    let account = self.acme_accounts.get_by_id(request.acme_account_id).await?;
    let mut client = self.client_for(&account)?;
    let challenge = ctx.run(client.use_manual_dns(&domains)).await?;

    Ok(ManualDnsRecord {
      record_name: challenge.record_name,
      record_value: challenge.record_value,
      record_type: "TXT".to_string(),
    })
  }

  /// Removes the stored order. The certificate is left untouched at the CA.
  #[instrument(level = Level::INFO, name = "CertificateService::delete", err, skip(self))]
  pub async fn delete(&self, order_id: u64) -> Result<(), Error> {
    self.orders.delete_by_id(order_id).await
  }

  pub async fn get(&self, order_id: u64) -> Result<CertificateOrder, Error> {
    self.orders.get_by_id(order_id).await
  }

  pub async fn list(&self) -> Result<Vec<CertificateOrder>, Error> {
    self.orders.list().await
  }
}
