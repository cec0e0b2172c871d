#![allow(dead_code)]

pub mod certs;
pub mod fake_acme;

use acme2_certs::repository::MemoryStore;
use acme2_certs::AcmeAccount;
use acme2_certs::CertificateService;
use acme2_certs::DnsProviderAccount;
use fake_acme::FakeAcme;
use std::sync::Arc;

pub struct TestEnv {
  pub store: Arc<MemoryStore>,
  pub acme: FakeAcme,
  pub service: CertificateService,
  pub acme_account_id: u64,
}

impl TestEnv {
  pub async fn new() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let acme = FakeAcme::new();
    let service = CertificateService::new(
      store.clone(),
      store.clone(),
      store.clone(),
      Arc::new(acme.clone()),
    );
    let acme_account_id = store
      .insert_acme_account(AcmeAccount {
        id: 0,
        email: "ops@example.com".to_string(),
        private_key: "account-key".to_string(),
      })
      .await;

    TestEnv {
      store,
      acme,
      service,
      acme_account_id,
    }
  }

  pub async fn add_dns_account(&self, r#type: &str) -> u64 {
    self
      .store
      .insert_dns_account(DnsProviderAccount {
        id: 0,
        name: "primary dns".to_string(),
        r#type: r#type.to_string(),
        authorization: r#"{"apiToken": "token"}"#.to_string(),
      })
      .await
  }
}
