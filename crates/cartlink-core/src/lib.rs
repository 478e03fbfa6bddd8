//! # cartlink-core
//!
//! The deterministic core of the cross-domain cart handoff - THE LOGIC.
//!
//! Two storefronts on separate domains behave as one: a Primary site
//! hands its cart to a Secondary checkout site through an opaque URL
//! token, the Secondary reports completions back, and stock is
//! reconciled across the pair.
//!
//! This crate holds everything that can be computed without touching the
//! network or the host platform:
//! - The snapshot codec (`codec`): cart ⇄ URL-safe transfer token
//! - The access policy (`pages`): page classification and allow-lists
//! - The decision engine (`engine`): the per-request redirect state machine
//! - The transfer executor (`executor`): applying snapshots to a cart
//! - Stock reconciliation (`stock`): consumed-quantity batches
//! - The site store (`storage`): settings, carts, catalog, activity log
//!
//! ## Architectural Constraints
//!
//! The core is pure and deterministic:
//! - NO async, NO network dependencies
//! - All I/O behind traits (`CartStore`, `Inventory`) or the redb store
//! - `BTreeMap`/`BTreeSet` only, for deterministic iteration

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod engine;
pub mod executor;
pub mod pages;
pub mod primitives;
pub mod request;
pub mod stock;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ActivityEntry, AttributeRecord, CartLineItem, CartSnapshot, CartlinkError, ProductRecord,
    ProductSummary, SiteConfig, SiteRole, StockReconciliationItem, StockUpdateResult,
    StockUpdateStatus, TermRef, VariationRecord,
};

// =============================================================================
// RE-EXPORTS: Protocol Surface
// =============================================================================

pub use codec::DecodeError;
pub use engine::{CartEffect, Decision, Outcome, evaluate};
pub use executor::{CartStore, MemoryCart, apply_snapshot, clear_cart};
pub use pages::PageTag;
pub use request::RequestContext;
pub use stock::{Inventory, StockEntry, apply_stock_update, batch_from_order};
pub use storage::{RedbStore, SessionCart, StoreInventory};
