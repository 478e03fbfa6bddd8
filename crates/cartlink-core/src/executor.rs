//! # Transfer Executor
//!
//! Applies a decoded cart snapshot to the local cart behind the
//! [`CartStore`] seam. The receiving cart is emptied first, then every
//! well-formed line is re-added, totals are recalculated once, and the
//! session is persisted so the cart survives the redirect that follows.
//!
//! Per-line failures do not abort the batch: a cart that is mostly right
//! beats a dead-end.

use crate::types::{CartSnapshot, CartlinkError};

/// The local cart, as the executor sees it.
///
/// Implemented by the session-backed store in the application and by
/// [`MemoryCart`] in tests.
pub trait CartStore {
    /// Remove every line from the cart.
    fn empty_cart(&mut self) -> Result<(), CartlinkError>;

    /// Add one line. `variation` pairs accompany a nonzero `variation_id`.
    fn add_item(
        &mut self,
        product_id: u64,
        quantity: u64,
        variation_id: u64,
        variation: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), CartlinkError>;

    /// Recalculate cart totals after a batch of mutations.
    fn recalculate_totals(&mut self) -> Result<(), CartlinkError>;

    /// Persist the cart into the session store.
    fn persist_session(&mut self) -> Result<(), CartlinkError>;

    /// True when the cart holds no lines.
    fn is_empty(&self) -> bool;

    /// Current cart contents as a snapshot.
    fn current_items(&self) -> CartSnapshot;
}

/// Replace the local cart with `snapshot`. Returns the number of lines
/// actually added.
///
/// Void lines (zero product id or quantity, the residue of lenient
/// decoding) are skipped; a line the store rejects is skipped too and the
/// rest of the batch proceeds. The first skip reason is reported through
/// the returned error only when *nothing* could be added from a non-empty
/// snapshot, so the caller can log a total failure distinctly.
pub fn apply_snapshot(
    cart: &mut dyn CartStore,
    snapshot: &CartSnapshot,
) -> Result<usize, CartlinkError> {
    cart.empty_cart()?;

    let mut added = 0usize;
    let mut first_failure: Option<CartlinkError> = None;
    for item in snapshot {
        if item.is_void() {
            continue;
        }
        match cart.add_item(item.product_id, item.quantity, item.variation_id, &item.variation) {
            Ok(()) => added += 1,
            Err(e) => {
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }

    cart.recalculate_totals()?;
    cart.persist_session()?;

    match (added, first_failure) {
        (0, Some(e)) => Err(e),
        _ => Ok(added),
    }
}

/// Empty the local cart and persist the empty state.
pub fn clear_cart(cart: &mut dyn CartStore) -> Result<(), CartlinkError> {
    cart.empty_cart()?;
    cart.recalculate_totals()?;
    cart.persist_session()
}

// =============================================================================
// IN-MEMORY CART
// =============================================================================

/// A plain in-memory [`CartStore`].
///
/// Used by tests, and by the gateway as a scratch cart for requests with
/// no session.
#[derive(Debug, Default, Clone)]
pub struct MemoryCart {
    items: CartSnapshot,
    /// Product ids the store refuses to add, simulating catalog misses.
    rejected_products: std::collections::BTreeSet<u64>,
}

impl MemoryCart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_items(items: CartSnapshot) -> Self {
        Self {
            items,
            rejected_products: std::collections::BTreeSet::new(),
        }
    }

    pub fn reject_product(&mut self, product_id: u64) {
        self.rejected_products.insert(product_id);
    }
}

impl CartStore for MemoryCart {
    fn empty_cart(&mut self) -> Result<(), CartlinkError> {
        self.items.clear();
        Ok(())
    }

    fn add_item(
        &mut self,
        product_id: u64,
        quantity: u64,
        variation_id: u64,
        variation: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), CartlinkError> {
        if self.rejected_products.contains(&product_id) {
            return Err(CartlinkError::CollaboratorUnavailable(format!(
                "product {product_id} cannot be added"
            )));
        }
        self.items.push(crate::types::CartLineItem {
            product_id,
            quantity,
            variation_id,
            variation: variation.clone(),
        });
        Ok(())
    }

    fn recalculate_totals(&mut self) -> Result<(), CartlinkError> {
        Ok(())
    }

    fn persist_session(&mut self) -> Result<(), CartlinkError> {
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn current_items(&self) -> CartSnapshot {
        self.items.clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::CartLineItem;

    #[test]
    fn apply_replaces_existing_contents() {
        let mut cart = MemoryCart::with_items(vec![CartLineItem::simple(99, 4)]);
        let snapshot = vec![CartLineItem::simple(7, 2), CartLineItem::simple(9, 1)];
        let added = apply_snapshot(&mut cart, &snapshot).expect("apply");
        assert_eq!(added, 2);
        assert_eq!(cart.current_items(), snapshot);
    }

    #[test]
    fn void_lines_are_skipped() {
        let mut cart = MemoryCart::new();
        let snapshot = vec![
            CartLineItem::simple(0, 2),
            CartLineItem::simple(7, 0),
            CartLineItem::simple(7, 2),
        ];
        let added = apply_snapshot(&mut cart, &snapshot).expect("apply");
        assert_eq!(added, 1);
        assert_eq!(cart.current_items(), vec![CartLineItem::simple(7, 2)]);
    }

    #[test]
    fn rejected_line_does_not_abort_the_batch() {
        let mut cart = MemoryCart::new();
        cart.reject_product(7);
        let snapshot = vec![CartLineItem::simple(7, 2), CartLineItem::simple(9, 1)];
        let added = apply_snapshot(&mut cart, &snapshot).expect("apply");
        assert_eq!(added, 1);
        assert_eq!(cart.current_items(), vec![CartLineItem::simple(9, 1)]);
    }

    #[test]
    fn total_failure_surfaces_an_error() {
        let mut cart = MemoryCart::new();
        cart.reject_product(7);
        let snapshot = vec![CartLineItem::simple(7, 2)];
        assert!(apply_snapshot(&mut cart, &snapshot).is_err());
        // The cart was still emptied and persisted.
        assert!(cart.is_empty());
    }

    #[test]
    fn empty_snapshot_just_clears() {
        let mut cart = MemoryCart::with_items(vec![CartLineItem::simple(99, 4)]);
        let added = apply_snapshot(&mut cart, &vec![]).expect("apply");
        assert_eq!(added, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn clear_cart_empties_and_persists() {
        let mut cart = MemoryCart::with_items(vec![CartLineItem::simple(5, 1)]);
        clear_cart(&mut cart).expect("clear");
        assert!(cart.is_empty());
    }
}
