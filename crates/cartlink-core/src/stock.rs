//! # Stock Reconciliation
//!
//! Builds a consumed-quantity batch from a completed order and applies an
//! inbound batch against a local inventory. The decrement targets the
//! variation when one is present, the parent product otherwise.
//!
//! A batch never fails as a whole: each item reports `success` or
//! `skipped` independently, and the caller returns the full result list.

use crate::types::{
    CartLineItem, CartlinkError, StockReconciliationItem, StockUpdateResult,
};

/// Stock state of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockEntry {
    /// Whether stock management is enabled for the entry.
    pub managed: bool,
    /// Current stock level. Meaningless when unmanaged.
    pub quantity: i64,
}

/// Local inventory, as reconciliation sees it.
pub trait Inventory {
    /// Stock state of a product or variation, `None` when unknown.
    fn stock_entry(&self, id: u64) -> Option<StockEntry>;

    /// Set the stock level of a known, managed entry.
    fn set_stock(&mut self, id: u64, quantity: i64) -> Result<(), CartlinkError>;
}

/// Build a reconciliation batch from a completed order's line items.
///
/// Void lines are dropped; everything else is carried verbatim.
#[must_use]
pub fn batch_from_order(lines: &[CartLineItem]) -> Vec<StockReconciliationItem> {
    lines
        .iter()
        .filter(|line| !line.is_void())
        .map(|line| StockReconciliationItem {
            product_id: line.product_id,
            variation_id: line.variation_id,
            quantity: line.quantity,
        })
        .collect()
}

/// Apply an inbound reconciliation batch against the local inventory.
///
/// Each item decrements the variation when `variation_id` is nonzero, the
/// product otherwise. Unknown entries, unmanaged entries, and storage
/// failures all yield a `skipped` result for that item; stock may go
/// negative, oversell is visible rather than hidden.
pub fn apply_stock_update(
    inventory: &mut dyn Inventory,
    batch: &[StockReconciliationItem],
) -> Vec<StockUpdateResult> {
    batch
        .iter()
        .map(|item| {
            let id = if item.variation_id > 0 {
                item.variation_id
            } else {
                item.product_id
            };
            apply_one(inventory, id, item.quantity)
        })
        .collect()
}

fn apply_one(inventory: &mut dyn Inventory, id: u64, quantity: u64) -> StockUpdateResult {
    let Some(entry) = inventory.stock_entry(id) else {
        return StockUpdateResult::skipped(id, "Product not found");
    };
    if !entry.managed {
        return StockUpdateResult::skipped(id, "Stock management disabled");
    }

    let new_stock = entry.quantity - i64::try_from(quantity).unwrap_or(i64::MAX);
    match inventory.set_stock(id, new_stock) {
        Ok(()) => StockUpdateResult::success(id, new_stock),
        Err(e) => StockUpdateResult::skipped(id, e.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
