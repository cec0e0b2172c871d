use super::AcmeAccountRepository;
use super::CertificateOrderRepository;
use super::DnsAccountRepository;
use crate::error::Entity;
use crate::error::Error;
use crate::model::AcmeAccount;
use crate::model::CertificateOrder;
use crate::model::DnsProviderAccount;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
  next_id: u64,
  acme_accounts: BTreeMap<u64, AcmeAccount>,
  dns_accounts: BTreeMap<u64, DnsProviderAccount>,
  orders: BTreeMap<u64, CertificateOrder>,
}

impl Tables {
  fn next_id(&mut self) -> u64 {
    self.next_id += 1;
    self.next_id
  }
}

/// An in-process store implementing every repository trait.
///
/// Ids are assigned from one sequence shared by all tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds an account, assigning its id.
  pub async fn insert_acme_account(&self, mut account: AcmeAccount) -> u64 {
    let mut tables = self.tables.write().await;
    account.id = tables.next_id();
    let id = account.id;
    tables.acme_accounts.insert(id, account);
    id
  }

  /// Adds a DNS provider account, assigning its id.
  pub async fn insert_dns_account(
    &self,
    mut account: DnsProviderAccount,
  ) -> u64 {
    let mut tables = self.tables.write().await;
    account.id = tables.next_id();
    let id = account.id;
    tables.dns_accounts.insert(id, account);
    id
  }

  pub async fn order_count(&self) -> usize {
    self.tables.read().await.orders.len()
  }
}

#[async_trait]
impl AcmeAccountRepository for MemoryStore {
  async fn get_by_id(&self, id: u64) -> Result<AcmeAccount, Error> {
    self
      .tables
      .read()
      .await
      .acme_accounts
      .get(&id)
      .cloned()
      .ok_or_else(|| Error::not_found(Entity::AcmeAccount, id))
  }
}

#[async_trait]
impl DnsAccountRepository for MemoryStore {
  async fn get_by_id(&self, id: u64) -> Result<DnsProviderAccount, Error> {
    self
      .tables
      .read()
      .await
      .dns_accounts
      .get(&id)
      .cloned()
      .ok_or_else(|| Error::not_found(Entity::DnsAccount, id))
  }
}

#[async_trait]
impl CertificateOrderRepository for MemoryStore {
  async fn create(
    &self,
    mut order: CertificateOrder,
  ) -> Result<CertificateOrder, Error> {
    let mut tables = self.tables.write().await;
    order.id = tables.next_id();
    tables.orders.insert(order.id, order.clone());
    Ok(order)
  }

  async fn get_by_id(&self, id: u64) -> Result<CertificateOrder, Error> {
    self
      .tables
      .read()
      .await
      .orders
      .get(&id)
      .cloned()
      .ok_or_else(|| Error::not_found(Entity::CertificateOrder, id))
  }

  async fn save(&self, order: &CertificateOrder) -> Result<(), Error> {
    let mut tables = self.tables.write().await;
    match tables.orders.get_mut(&order.id) {
      Some(stored) => {
        *stored = order.clone();
        Ok(())
      }
      None => Err(Error::not_found(Entity::CertificateOrder, order.id)),
    }
  }

  async fn delete_by_id(&self, id: u64) -> Result<(), Error> {
    self
      .tables
      .write()
      .await
      .orders
      .remove(&id)
      .map(|_| ())
      .ok_or_else(|| Error::not_found(Entity::CertificateOrder, id))
  }

  async fn list(&self) -> Result<Vec<CertificateOrder>, Error> {
    Ok(self.tables.read().await.orders.values().rev().cloned().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ProviderKind;
  use chrono::DateTime;

  fn order(domain: &str) -> CertificateOrder {
    let epoch = DateTime::from_timestamp(0, 0).unwrap();
    CertificateOrder {
      id: 0,
      acme_account_id: 1,
      dns_account_id: None,
      provider: ProviderKind::Http,
      primary_domain: domain.to_string(),
      other_domains: vec![],
      private_key: String::new(),
      certificate_pem: String::new(),
      cert_order_url: "https://ca.test/order/1".to_string(),
      not_before: epoch,
      not_after: epoch,
      issuer_common_name: String::new(),
      issuer_organization: "Test".to_string(),
    }
  }

  #[tokio::test]
  async fn ids_come_from_one_sequence() {
    let store = MemoryStore::new();
    let account_id = store
      .insert_acme_account(AcmeAccount {
        id: 0,
        email: "ops@example.com".to_string(),
        private_key: String::new(),
      })
      .await;
    let created = store.create(order("example.com")).await.unwrap();

    assert_eq!(account_id, 1);
    assert_eq!(created.id, 2);
    let stored = CertificateOrderRepository::get_by_id(&store, created.id)
      .await
      .unwrap();
    assert_eq!(stored.primary_domain, "example.com");
  }

  #[tokio::test]
  async fn save_overwrites_and_rejects_unknown_ids() {
    let store = MemoryStore::new();
    let mut created = store.create(order("example.com")).await.unwrap();
    created.cert_order_url = "https://ca.test/order/2".to_string();
    store.save(&created).await.unwrap();
    assert_eq!(
      CertificateOrderRepository::get_by_id(&store, created.id)
        .await
        .unwrap()
        .cert_order_url,
      "https://ca.test/order/2"
    );

    created.id = 99;
    let err = store.save(&created).await.unwrap_err();
    assert!(matches!(
      err,
      Error::NotFound { entity: Entity::CertificateOrder, id: 99 }
    ));
  }

  #[tokio::test]
  async fn second_delete_is_not_found() {
    let store = MemoryStore::new();
    let created = store.create(order("example.com")).await.unwrap();
    store.delete_by_id(created.id).await.unwrap();
    assert!(store.delete_by_id(created.id).await.unwrap_err().is_not_found());
    assert_eq!(store.order_count().await, 0);
  }

  #[tokio::test]
  async fn missing_accounts_name_their_entity() {
    let store = MemoryStore::new();
    let err = AcmeAccountRepository::get_by_id(&store, 5).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: Entity::AcmeAccount, id: 5 }));
    let err = DnsAccountRepository::get_by_id(&store, 6).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: Entity::DnsAccount, id: 6 }));
  }
}
