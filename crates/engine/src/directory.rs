//! HTTP client for the external contact/company directory.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use cadence_core::types::{Company, Contact};
use cadence_core::{CadenceError, CadenceResult, ContactDirectory};

/// Reads `GET {base}/contacts/{id}` and `GET {base}/companies/{domain}`.
/// A 404 is an unknown record, any other failure is a collaborator error.
pub struct HttpContactDirectory {
    client: reqwest::Client,
    base: Url,
}

impl HttpContactDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> CadenceResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| CadenceError::Config(format!("directory url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(CadenceError::Config(format!(
                "directory url {base_url:?} cannot be a base"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CadenceError::Config(format!("directory client: {e}")))?;
        Ok(Self { client, base })
    }

    fn url(&self, collection: &str, key: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(collection).push(key);
        }
        url
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> CadenceResult<Option<T>> {
        debug!(url = %url, "Directory lookup");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CadenceError::Collaborator(format!("directory unreachable: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| CadenceError::Collaborator(format!("invalid directory record: {e}"))),
            status => Err(CadenceError::Collaborator(format!(
                "directory returned {status}"
            ))),
        }
    }
}

#[async_trait]
impl ContactDirectory for HttpContactDirectory {
    async fn contact(&self, contact_id: &str) -> CadenceResult<Option<Contact>> {
        self.fetch(self.url("contacts", contact_id)).await
    }

    async fn company(&self, domain: &str) -> CadenceResult<Option<Company>> {
        self.fetch(self.url("companies", domain)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_escapes_keys() {
        let dir =
            HttpContactDirectory::new("http://directory.local/api/", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            dir.url("contacts", "c 1/x").as_str(),
            "http://directory.local/api/contacts/c%201%2Fx"
        );
        assert_eq!(
            dir.url("companies", "acme.io").as_str(),
            "http://directory.local/api/companies/acme.io"
        );
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(HttpContactDirectory::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpContactDirectory::new("mailto:x@y.z", Duration::from_secs(1)).is_err());
    }
}
