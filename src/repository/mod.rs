//! Persistence seams for accounts and certificate orders.
//!
//! Implementations report a missing id as [`Error::NotFound`] and any
//! storage failure as [`Error::Repository`].

mod memory;

pub use memory::MemoryStore;

use crate::error::Error;
use crate::model::AcmeAccount;
use crate::model::CertificateOrder;
use crate::model::DnsProviderAccount;
use async_trait::async_trait;

#[async_trait]
pub trait AcmeAccountRepository: Send + Sync {
  async fn get_by_id(&self, id: u64) -> Result<AcmeAccount, Error>;
}

#[async_trait]
pub trait DnsAccountRepository: Send + Sync {
  async fn get_by_id(&self, id: u64) -> Result<DnsProviderAccount, Error>;
}

#[async_trait]
pub trait CertificateOrderRepository: Send + Sync {
  /// Stores a new order and returns it with its assigned id.
  async fn create(
    &self,
    order: CertificateOrder,
  ) -> Result<CertificateOrder, Error>;

  async fn get_by_id(&self, id: u64) -> Result<CertificateOrder, Error>;

  /// Overwrites an existing order.
  async fn save(&self, order: &CertificateOrder) -> Result<(), Error>;

  async fn delete_by_id(&self, id: u64) -> Result<(), Error>;

  /// All orders, newest first.
  async fn list(&self) -> Result<Vec<CertificateOrder>, Error>;
}
