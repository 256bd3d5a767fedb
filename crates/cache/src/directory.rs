//! Read-through cache in front of a `ContactDirectory`.
//!
//! Miss behavior: a lookup that is absent upstream, or that fails, resolves
//! to `Ok(None)` ("unknown") and is not cached. Cadence progress never
//! blocks on enrichment.

use crate::local::LocalCache;
use async_trait::async_trait;
use cadence_core::config::CacheConfig;
use cadence_core::types::{Company, Contact};
use cadence_core::{CadenceResult, ContactDirectory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct CachedDirectory {
    inner: Arc<dyn ContactDirectory>,
    contacts: LocalCache<String, Contact>,
    companies: LocalCache<String, Company>,
}

impl CachedDirectory {
    pub fn new(inner: Arc<dyn ContactDirectory>, config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        Self {
            inner,
            contacts: LocalCache::new(ttl, config.max_entries),
            companies: LocalCache::new(ttl, config.max_entries),
        }
    }

    /// Drop a contact so the next lookup goes upstream.
    pub fn invalidate_contact(&self, contact_id: &str) {
        self.contacts.invalidate(&contact_id.to_string());
    }

    /// Remove expired entries from both maps.
    pub fn maintenance(&self) -> usize {
        let evicted = self.contacts.evict_expired() + self.companies.evict_expired();
        if evicted > 0 {
            debug!(evicted, "Directory cache maintenance");
        }
        evicted
    }
}

#[async_trait]
impl ContactDirectory for CachedDirectory {
    async fn contact(&self, contact_id: &str) -> CadenceResult<Option<Contact>> {
        let key = contact_id.to_string();
        if let Some(contact) = self.contacts.get(&key) {
            metrics::counter!("cache.directory.hit", "kind" => "contact").increment(1);
            return Ok(Some(contact));
        }
        metrics::counter!("cache.directory.miss", "kind" => "contact").increment(1);

        match self.inner.contact(contact_id).await {
            Ok(Some(contact)) => {
                self.contacts.put(key, contact.clone());
                Ok(Some(contact))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(contact_id, error = %e, "Contact lookup failed, treating as unknown");
                Ok(None)
            }
        }
    }

    async fn company(&self, domain: &str) -> CadenceResult<Option<Company>> {
        let key = domain.to_lowercase();
        if let Some(company) = self.companies.get(&key) {
            metrics::counter!("cache.directory.hit", "kind" => "company").increment(1);
            return Ok(Some(company));
        }
        metrics::counter!("cache.directory.miss", "kind" => "company").increment(1);

        match self.inner.company(domain).await {
            Ok(Some(company)) => {
                self.companies.put(key, company.clone());
                Ok(Some(company))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(domain, error = %e, "Company lookup failed, treating as unknown");
                Ok(None)
            }
        }
    }
}
