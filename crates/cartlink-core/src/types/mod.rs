//! # Core Type Definitions
//!
//! This module contains the data model of the handoff protocol:
//! - Site configuration (`SiteRole`, `SiteConfig`)
//! - Cart contents (`CartLineItem`, `CartSnapshot`)
//! - Stock reconciliation (`StockReconciliationItem`, `StockUpdateResult`)
//! - Catalog records served over the replication surface (`ProductRecord`)
//! - Error types (`CartlinkError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module use `BTreeMap`/`BTreeSet` for deterministic
//! ordering and integer arithmetic only. Wire field names follow the
//! peer-visible JSON contract (`product_id`, `variation_id`, `quantity`,
//! `variation`) and must not change between releases.

use crate::pages::PageTag;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

// =============================================================================
// SITE CONFIGURATION
// =============================================================================

/// Which half of a handoff pair this installation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteRole {
    /// Customer-facing storefront; hands cart/checkout off to the peer.
    Primary,
    /// Checkout-processing storefront; reports completions back.
    Secondary,
}

/// Per-installation configuration.
///
/// Loaded fresh from the settings store at the start of each request and
/// immutable for the request's duration. No component re-reads the store
/// mid-request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Role of this installation in the handoff pair.
    pub role: SiteRole,
    /// Master switch. When false the decision engine always allows.
    pub enabled: bool,
    /// Base URL of the peer site. Empty means not configured.
    pub peer_url: String,
    /// Shared secret guarding the inbound protocol endpoints.
    pub shared_secret: String,
    /// Pages this site is allowed to serve locally. Empty denies everything.
    pub allowed_pages: BTreeSet<PageTag>,
    /// Gate for non-error activity log entries.
    pub debug_logging: bool,
    /// Request-path fragments the Secondary never redirects away
    /// (payment-provider callbacks).
    pub bypass_path_fragments: Vec<String>,
}

impl SiteConfig {
    /// True when a peer URL is configured.
    #[must_use]
    pub fn has_peer(&self) -> bool {
        !self.peer_url.trim().is_empty()
    }

    /// True when both peer URL and shared secret are configured.
    ///
    /// Outbound calls (reconciliation push, catalog replication) require
    /// both; anything less is `ConfigMissing`.
    #[must_use]
    pub fn peer_ready(&self) -> bool {
        self.has_peer() && !self.shared_secret.is_empty()
    }
}

// =============================================================================
// CART CONTENTS
// =============================================================================

/// One line of a shopping cart.
///
/// `variation_id == 0` means the line refers to a simple (non-variable)
/// product. Well-formed lines have `product_id > 0` and `quantity > 0`;
/// zero-valued lines can appear after lenient decoding and are skipped by
/// the transfer executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartLineItem {
    pub product_id: u64,
    pub quantity: u64,
    #[serde(default)]
    pub variation_id: u64,
    /// Selected variation attributes, e.g. `attribute_pa_color => red`.
    #[serde(default)]
    pub variation: BTreeMap<String, String>,
}

impl CartLineItem {
    /// Create a simple line item without variation data.
    #[must_use]
    pub fn simple(product_id: u64, quantity: u64) -> Self {
        Self {
            product_id,
            quantity,
            variation_id: 0,
            variation: BTreeMap::new(),
        }
    }

    /// True when the line carries nothing worth transferring.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.product_id == 0 || self.quantity == 0
    }
}

/// An ordered list of cart lines.
///
/// Ordering is not semantically significant but is preserved end to end
/// for reproducibility: `decode(encode(s)) == s`.
pub type CartSnapshot = Vec<CartLineItem>;

// =============================================================================
// STOCK RECONCILIATION
// =============================================================================

/// One consumed-quantity report, built from a completed order's line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReconciliationItem {
    pub product_id: u64,
    #[serde(default)]
    pub variation_id: u64,
    /// Quantity to decrement on the receiving site.
    pub quantity: u64,
}

/// Per-item outcome of a stock update batch.
///
/// The receiving endpoint never fails a whole batch for one bad item; each
/// item independently reports `success` or `skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdateResult {
    /// The catalog id the decrement targeted (variation id when nonzero,
    /// product id otherwise).
    pub id: u64,
    pub status: StockUpdateStatus,
    /// New stock level after a successful decrement.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_stock: Option<i64>,
    /// Why the item was skipped.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

/// Status of a single stock update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockUpdateStatus {
    Success,
    Skipped,
}

impl StockUpdateResult {
    /// A successful decrement down to `new_stock`.
    #[must_use]
    pub fn success(id: u64, new_stock: i64) -> Self {
        Self {
            id,
            status: StockUpdateStatus::Success,
            new_stock: Some(new_stock),
            reason: None,
        }
    }

    /// A skipped item with a human-readable reason.
    #[must_use]
    pub fn skipped(id: u64, reason: impl Into<String>) -> Self {
        Self {
            id,
            status: StockUpdateStatus::Skipped,
            new_stock: None,
            reason: Some(reason.into()),
        }
    }
}

// =============================================================================
// CATALOG RECORDS
// =============================================================================

/// Minimal listing entry returned by the `/products` route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: u64,
    pub title: String,
}

/// A taxonomy term reference (category or tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRef {
    pub slug: String,
    pub name: String,
}

/// A product attribute, optionally taxonomy-backed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeRecord {
    pub name: String,
    pub visible: bool,
    pub variation: bool,
    /// Free-form option values for non-taxonomy attributes.
    #[serde(default)]
    pub options: Vec<String>,
    /// Taxonomy name when the attribute is taxonomy-backed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub taxonomy: Option<String>,
    /// Terms of a taxonomy-backed attribute.
    #[serde(default)]
    pub terms: Vec<TermRef>,
}

/// One variation of a variable product.
///
/// Variations keep their source-side numeric id so replication preserves
/// identifiers across sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VariationRecord {
    pub id: u64,
    pub status: String,
    pub regular_price: String,
    pub sale_price: String,
    pub sku: String,
    pub manage_stock: bool,
    pub stock_quantity: i64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub featured_image_url: Option<String>,
}

/// Full product record served by `/product/{id}` and consumed by the
/// replication pipeline. Prices are carried as strings, matching the
/// commerce platform's own representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProductRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    pub status: String,
    #[serde(default)]
    pub regular_price: String,
    #[serde(default)]
    pub sale_price: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub manage_stock: bool,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub featured_image_url: Option<String>,
    #[serde(default)]
    pub gallery_image_urls: Vec<String>,
    #[serde(rename = "sync_categories", default)]
    pub categories: Vec<TermRef>,
    #[serde(rename = "sync_tags", default)]
    pub tags: Vec<TermRef>,
    #[serde(rename = "sync_attributes", default)]
    pub attributes: Vec<AttributeRecord>,
    #[serde(rename = "sync_variations", default)]
    pub variations: Vec<VariationRecord>,
}

impl ProductRecord {
    /// True when the product should appear in the `/products` listing.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == "publish"
    }
}

// =============================================================================
// ACTIVITY LOG
// =============================================================================

/// One entry of the capped, most-recent-first activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unix timestamp, seconds.
    pub time: u64,
    pub message: String,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors of the handoff protocol.
///
/// Nothing here is fatal to the host process. Failures on the redirect
/// path are recovered locally (the shopper always gets a redirect or a
/// render); failures on outbound calls surface only through the activity
/// log.
#[derive(Debug, Error)]
pub enum CartlinkError {
    /// Peer URL or shared secret not configured; the operation is aborted
    /// before any redirect or push is attempted.
    #[error("peer URL or shared secret not configured")]
    ConfigMissing,

    /// A transfer token could not be decoded. Callers treat this as "no
    /// token present" and continue through the remaining rules.
    #[error("transfer token decode failed: {0}")]
    Decode(String),

    /// Bad or missing shared-secret header on an inbound protocol call.
    /// The HTTP layer expresses this as a bare 401.
    #[error("shared secret authentication failed")]
    AuthFailure,

    /// Network failure or non-2xx from the peer during reconciliation or
    /// replication. Logged; the batch is aborted, never retried.
    #[error("peer unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The local commerce collaborator is unavailable; cart operations are
    /// skipped but the redirect still proceeds.
    #[error("commerce collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// An embedded-store I/O error occurred.
    #[error("storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<crate::codec::DecodeError> for CartlinkError {
    fn from(e: crate::codec::DecodeError) -> Self {
        Self::Decode(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn peer_ready_requires_both_url_and_secret() {
        let mut config = SiteConfig {
            role: SiteRole::Secondary,
            enabled: true,
            peer_url: String::new(),
            shared_secret: String::new(),
            allowed_pages: BTreeSet::new(),
            debug_logging: false,
            bypass_path_fragments: vec![],
        };
        assert!(!config.peer_ready());

        config.peer_url = "https://shop.example.com".into();
        assert!(!config.peer_ready());

        config.shared_secret = "s3cret".into();
        assert!(config.peer_ready());
    }

    #[test]
    fn whitespace_peer_url_is_not_configured() {
        let config = SiteConfig {
            role: SiteRole::Primary,
            enabled: true,
            peer_url: "   ".into(),
            shared_secret: "x".into(),
            allowed_pages: BTreeSet::new(),
            debug_logging: false,
            bypass_path_fragments: vec![],
        };
        assert!(!config.has_peer());
    }

    #[test]
    fn void_line_items() {
        assert!(CartLineItem::simple(0, 3).is_void());
        assert!(CartLineItem::simple(7, 0).is_void());
        assert!(!CartLineItem::simple(7, 3).is_void());
    }

    #[test]
    fn stock_result_wire_shape() {
        let ok = StockUpdateResult::success(42, 5);
        let json = serde_json::to_value(&ok).expect("serialize");
        assert_eq!(json["status"], "success");
        assert_eq!(json["new_stock"], 5);
        assert!(json.get("reason").is_none());

        let skipped = StockUpdateResult::skipped(42, "Product not found");
        let json = serde_json::to_value(&skipped).expect("serialize");
        assert_eq!(json["status"], "skipped");
        assert!(json.get("new_stock").is_none());
    }

    #[test]
    fn product_record_wire_field_names() {
        let record = ProductRecord {
            id: 1,
            name: "Widget".into(),
            status: "publish".into(),
            categories: vec![TermRef {
                slug: "tools".into(),
                name: "Tools".into(),
            }],
            ..ProductRecord::default()
        };
        let json = serde_json::to_value(&record).expect("serialize");
        // Replication peers key off the sync_* names.
        assert!(json.get("sync_categories").is_some());
        assert!(json.get("sync_variations").is_some());
        assert!(record.is_published());
    }
}
