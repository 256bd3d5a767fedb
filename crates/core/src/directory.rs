//! Contact/company lookup capability.
//!
//! Discovery and enrichment live outside this workspace; the engine only
//! reads already-enriched records through this trait.

use crate::error::CadenceResult;
use crate::types::{Company, Contact};
use async_trait::async_trait;
use dashmap::DashMap;

/// Read-only lookup of enriched contacts and companies.
///
/// `Ok(None)` means the record is unknown; `Err` means the lookup itself
/// failed. Callers on the cadence path treat both as "unknown".
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn contact(&self, contact_id: &str) -> CadenceResult<Option<Contact>>;
    async fn company(&self, domain: &str) -> CadenceResult<Option<Company>>;
}

/// Map-backed directory for development and tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    contacts: DashMap<String, Contact>,
    companies: DashMap<String, Company>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_contact(&self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }

    pub fn put_company(&self, company: Company) {
        self.companies.insert(company.domain.to_lowercase(), company);
    }
}

#[async_trait]
impl ContactDirectory for InMemoryDirectory {
    async fn contact(&self, contact_id: &str) -> CadenceResult<Option<Contact>> {
        Ok(self.contacts.get(contact_id).map(|r| r.value().clone()))
    }

    async fn company(&self, domain: &str) -> CadenceResult<Option<Company>> {
        Ok(self
            .companies
            .get(&domain.to_lowercase())
            .map(|r| r.value().clone()))
    }
}
