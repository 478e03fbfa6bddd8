//! # Stock Reconciliation Pusher
//!
//! Outbound client that reports consumed stock to the peer after an
//! order completes here. Fire-and-forget by contract: one attempt, a
//! hard timeout, no retry, no queue. A missed push means the peer's
//! stock drifts until the next reconciliation, never a blocked checkout.

use crate::api::types::{StockUpdateRequest, StockUpdateResponse};
use cartlink_core::primitives::{PUSH_TIMEOUT_SECS, SECRET_HEADER};
use cartlink_core::{
    CartlinkError, SiteConfig, SiteRole, StockReconciliationItem, StockUpdateResult,
};
use std::time::Duration;

/// Outbound reconciliation client.
#[derive(Debug, Clone)]
pub struct StockPusher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for StockPusher {
    fn default() -> Self {
        Self::new()
    }
}

impl StockPusher {
    /// Client with the standard push timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(PUSH_TIMEOUT_SECS))
    }

    /// Client with an explicit timeout (tests inject short ones).
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Push one consumed-stock batch to the peer.
    ///
    /// Only the Secondary pushes: orders complete there, and the Primary
    /// holds the authoritative stock. Requires a configured peer URL and
    /// shared secret.
    pub async fn push(
        &self,
        config: &SiteConfig,
        batch: &[StockReconciliationItem],
    ) -> Result<Vec<StockUpdateResult>, CartlinkError> {
        if config.role != SiteRole::Secondary {
            return Err(CartlinkError::ConfigMissing);
        }
        if !config.peer_ready() {
            return Err(CartlinkError::ConfigMissing);
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/ct/v1/stock/update",
            config.peer_url.trim_end_matches('/')
        );
        let request = StockUpdateRequest {
            items: batch.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .header(SECRET_HEADER, &config.shared_secret)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| CartlinkError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CartlinkError::UpstreamUnavailable(format!(
                "stock update returned {status}"
            )));
        }

        let body: StockUpdateResponse = response
            .json()
            .await
            .map_err(|e| CartlinkError::UpstreamUnavailable(e.to_string()))?;
        Ok(body.results)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn config(role: SiteRole, peer_url: &str, secret: &str) -> SiteConfig {
        SiteConfig {
            role,
            enabled: true,
            peer_url: peer_url.into(),
            shared_secret: secret.into(),
            allowed_pages: BTreeSet::new(),
            debug_logging: false,
            bypass_path_fragments: vec![],
        }
    }

    fn batch() -> Vec<StockReconciliationItem> {
        vec![StockReconciliationItem {
            product_id: 7,
            variation_id: 0,
            quantity: 2,
        }]
    }

    #[tokio::test]
    async fn primary_never_pushes() {
        let pusher = StockPusher::new();
        let result = pusher
            .push(&config(SiteRole::Primary, "https://peer", "s"), &batch())
            .await;
        assert!(matches!(result, Err(CartlinkError::ConfigMissing)));
    }

    #[tokio::test]
    async fn unconfigured_peer_is_rejected_before_any_network() {
        let pusher = StockPusher::new();
        let result = pusher
            .push(&config(SiteRole::Secondary, "", "s"), &batch())
            .await;
        assert!(matches!(result, Err(CartlinkError::ConfigMissing)));

        let result = pusher
            .push(&config(SiteRole::Secondary, "https://peer", ""), &batch())
            .await;
        assert!(matches!(result, Err(CartlinkError::ConfigMissing)));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let pusher = StockPusher::new();
        let results = pusher
            .push(&config(SiteRole::Secondary, "https://peer", "s"), &[])
            .await
            .expect("empty batch");
        assert!(results.is_empty());
    }
}
