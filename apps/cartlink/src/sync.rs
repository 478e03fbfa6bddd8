//! # Catalog Replication
//!
//! Pulls the peer's product catalog into the local store so the checkout
//! site can sell what the storefront lists. Replication is pull-based
//! and sequential: list ids first, then fetch each full record, stopping
//! on the first failure so a flaky peer cannot leave the catalog half
//! interleaved with two generations of data.

use crate::api::types::ErrorResponse;
use cartlink_core::primitives::{SECRET_HEADER, SYNC_TIMEOUT_SECS};
use cartlink_core::{CartlinkError, ProductRecord, ProductSummary, RedbStore, SiteConfig};
use std::time::Duration;

/// HTTP client for the peer's replication feed.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base: String,
    secret: String,
    timeout: Duration,
}

impl CatalogClient {
    /// Client bound to a configured peer.
    pub fn new(config: &SiteConfig) -> Result<Self, CartlinkError> {
        if !config.peer_ready() {
            return Err(CartlinkError::ConfigMissing);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base: config.peer_url.trim_end_matches('/').to_string(),
            secret: config.shared_secret.clone(),
            timeout: Duration::from_secs(SYNC_TIMEOUT_SECS),
        })
    }

    /// Override the request timeout (tests inject short ones).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// List the peer's published products.
    pub async fn list_products(&self) -> Result<Vec<ProductSummary>, CartlinkError> {
        let url = format!("{}/ct/v1/products", self.base);
        let response = self
            .client
            .get(&url)
            .header(SECRET_HEADER, &self.secret)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CartlinkError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CartlinkError::UpstreamUnavailable(format!(
                "product listing returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| CartlinkError::UpstreamUnavailable(e.to_string()))
    }

    /// Fetch one full product record.
    pub async fn fetch_product(&self, id: u64) -> Result<ProductRecord, CartlinkError> {
        let url = format!("{}/ct/v1/product/{}", self.base, id);
        let response = self
            .client
            .get(&url)
            .header(SECRET_HEADER, &self.secret)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CartlinkError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Surface the peer's machine code when it sent one.
            let code = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.code)
                .unwrap_or_else(|_| status.to_string());
            return Err(CartlinkError::UpstreamUnavailable(format!(
                "product {id} fetch failed: {code}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| CartlinkError::UpstreamUnavailable(e.to_string()))
    }
}

/// Outcome of one replication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Products the peer listed.
    pub listed: usize,
    /// Full records fetched and stored.
    pub fetched: usize,
}

/// Replicate the peer's catalog into the local store.
///
/// With `ids` the run is limited to those products; otherwise the peer's
/// full listing drives it. Sequential and fail-fast either way: a fetch
/// or store error aborts the run and leaves already-replicated records
/// in place.
pub async fn run_sync(
    store: &RedbStore,
    client: &CatalogClient,
    ids: Option<&[u64]>,
) -> Result<SyncReport, CartlinkError> {
    let ids: Vec<u64> = match ids {
        Some(ids) => ids.to_vec(),
        None => client
            .list_products()
            .await?
            .into_iter()
            .map(|summary| summary.id)
            .collect(),
    };
    let listed = ids.len();

    let mut fetched = 0usize;
    for id in ids {
        let record = client.fetch_product(id).await?;
        store.put_product(&record)?;
        fetched += 1;
        tracing::debug!(product_id = record.id, "Replicated product");
    }

    tracing::info!(listed, fetched, "Catalog replication finished");
    Ok(SyncReport { listed, fetched })
}
