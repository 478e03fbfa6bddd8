//! # API Request/Response Types
//!
//! This module defines the JSON structures of the protocol surface.
//! Wire field names are a cross-site contract shared with the peer.

use cartlink_core::{CartLineItem, StockReconciliationItem, StockUpdateResult};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Error envelope, WP-REST style: a stable machine code plus a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

// =============================================================================
// STOCK UPDATE REQUEST/RESPONSE
// =============================================================================

/// Inbound stock reconciliation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUpdateRequest {
    pub items: Vec<StockReconciliationItem>,
}

/// Per-item outcomes of a reconciliation batch.
///
/// `success` covers the batch as a whole (the request was processed);
/// per-item failures show up as `skipped` results, never as a batch
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUpdateResponse {
    #[serde(default)]
    pub success: bool,
    pub results: Vec<StockUpdateResult>,
}

// =============================================================================
// ORDER COMPLETION
// =============================================================================

/// Order-completion notification: the checkout site reports a finished
/// order so consumed stock can be pushed back to the peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedRequest {
    pub order_id: u64,
    pub items: Vec<CartLineItem>,
}

/// Acknowledgement of an order-completion notification.
///
/// The push itself is fire-and-forget; acceptance only means the batch
/// was handed to the pusher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedResponse {
    pub accepted: bool,
    pub batch_size: usize,
}
