//! # redb-backed Site Store
//!
//! One embedded database holds everything a site installation persists:
//! settings, the capped activity log, per-session carts, and the product
//! catalog with its variation index.
//!
//! ACID transactions and MVCC come from redb (concurrent readers, single
//! writer); values are postcard-serialized. Nothing here caches: settings
//! are read fresh per request by design, so a config change takes effect
//! on the next request without a restart.

use crate::executor::CartStore;
use crate::primitives::{ACTIVITY_LOG_CAP, ACTIVITY_MESSAGE_TRUNCATE};
use crate::stock::{Inventory, StockEntry};
use crate::types::{
    ActivityEntry, CartSnapshot, CartlinkError, ProductRecord, ProductSummary, SiteConfig,
};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for settings: key string -> serialized value bytes
const SETTINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

/// Table for the activity log: sequence number -> serialized ActivityEntry
const ACTIVITY: TableDefinition<u64, &[u8]> = TableDefinition::new("activity");

/// Table for session carts: session key -> serialized CartSnapshot
const CARTS: TableDefinition<&str, &[u8]> = TableDefinition::new("carts");

/// Table for the catalog: product id -> serialized ProductRecord
const PRODUCTS: TableDefinition<u64, &[u8]> = TableDefinition::new("products");

/// Index from variation id to parent product id, so stock updates can
/// target a variation without scanning the catalog.
const VARIATIONS: TableDefinition<u64, u64> = TableDefinition::new("variations");

const CONFIG_KEY: &str = "site_config";

/// A disk-backed site store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CartlinkError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(SETTINGS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(ACTIVITY)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(CARTS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(PRODUCTS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(VARIATIONS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        }

        Ok(Self { db })
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    /// Load the site configuration, `None` when the site is uninitialized.
    pub fn load_config(&self) -> Result<Option<SiteConfig>, CartlinkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(SETTINGS)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let Some(bytes) = table
            .get(CONFIG_KEY)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        let config = postcard::from_bytes(bytes.value())
            .map_err(|e| CartlinkError::Serialization(e.to_string()))?;
        Ok(Some(config))
    }

    /// Persist the site configuration.
    pub fn save_config(&self, config: &SiteConfig) -> Result<(), CartlinkError> {
        let bytes = postcard::to_allocvec(config)
            .map_err(|e| CartlinkError::Serialization(e.to_string()))?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(SETTINGS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            table
                .insert(CONFIG_KEY, bytes.as_slice())
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CartlinkError::Storage(e.to_string()))
    }

    // =========================================================================
    // ACTIVITY LOG
    // =========================================================================

    /// Append one activity entry, truncating the message and pruning the
    /// log to its cap in the same transaction.
    pub fn append_activity(&self, time: u64, message: &str) -> Result<(), CartlinkError> {
        let mut message = message.to_string();
        if message.len() > ACTIVITY_MESSAGE_TRUNCATE {
            // Truncate on a char boundary.
            let mut cut = ACTIVITY_MESSAGE_TRUNCATE;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        let entry = ActivityEntry { time, message };
        let bytes = postcard::to_allocvec(&entry)
            .map_err(|e| CartlinkError::Serialization(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(ACTIVITY)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let next_seq = {
                let last = table
                    .last()
                    .map_err(|e| CartlinkError::Storage(e.to_string()))?;
                last.map(|(k, _)| k.value().saturating_add(1)).unwrap_or(0)
            };
            table
                .insert(next_seq, bytes.as_slice())
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;

            // Prune oldest entries beyond the cap.
            loop {
                let len = redb::ReadableTableMetadata::len(&table)
                    .map_err(|e| CartlinkError::Storage(e.to_string()))?;
                if len as usize <= ACTIVITY_LOG_CAP {
                    break;
                }
                let oldest = {
                    let first = table
                        .first()
                        .map_err(|e| CartlinkError::Storage(e.to_string()))?;
                    match first {
                        Some((k, _)) => k.value(),
                        None => break,
                    }
                };
                table
                    .remove(oldest)
                    .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| CartlinkError::Storage(e.to_string()))
    }

    /// The retained activity log, most recent first.
    pub fn recent_activity(&self) -> Result<Vec<ActivityEntry>, CartlinkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(ACTIVITY)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let mut entries = Vec::new();
        for item in table
            .iter()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?
            .rev()
        {
            let (_, value) = item.map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let entry: ActivityEntry = postcard::from_bytes(value.value())
                .map_err(|e| CartlinkError::Serialization(e.to_string()))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    // =========================================================================
    // SESSION CARTS
    // =========================================================================

    /// Load a session's cart, empty when the session is unknown.
    pub fn load_cart(&self, session: &str) -> Result<CartSnapshot, CartlinkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(CARTS)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let Some(bytes) = table
            .get(session)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?
        else {
            return Ok(Vec::new());
        };
        postcard::from_bytes(bytes.value())
            .map_err(|e| CartlinkError::Serialization(e.to_string()))
    }

    /// Persist a session's cart.
    pub fn save_cart(&self, session: &str, cart: &CartSnapshot) -> Result<(), CartlinkError> {
        let bytes = postcard::to_allocvec(cart)
            .map_err(|e| CartlinkError::Serialization(e.to_string()))?;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(CARTS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            table
                .insert(session, bytes.as_slice())
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CartlinkError::Storage(e.to_string()))
    }

    // =========================================================================
    // CATALOG
    // =========================================================================

    /// Insert or replace a product record, maintaining the variation index.
    pub fn put_product(&self, record: &ProductRecord) -> Result<(), CartlinkError> {
        let bytes = postcard::to_allocvec(record)
            .map_err(|e| CartlinkError::Serialization(e.to_string()))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        {
            let mut products = write_txn
                .open_table(PRODUCTS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let mut variations = write_txn
                .open_table(VARIATIONS)
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;

            // Drop index entries for variations removed by this update.
            let previous: Option<ProductRecord> = {
                let existing = products
                    .get(record.id)
                    .map_err(|e| CartlinkError::Storage(e.to_string()))?;
                match existing {
                    Some(bytes) => Some(
                        postcard::from_bytes(bytes.value())
                            .map_err(|e| CartlinkError::Serialization(e.to_string()))?,
                    ),
                    None => None,
                }
            };
            if let Some(previous) = previous {
                for variation in &previous.variations {
                    if !record.variations.iter().any(|v| v.id == variation.id) {
                        variations
                            .remove(variation.id)
                            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
                    }
                }
            }

            products
                .insert(record.id, bytes.as_slice())
                .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            for variation in &record.variations {
                variations
                    .insert(variation.id, record.id)
                    .map_err(|e| CartlinkError::Storage(e.to_string()))?;
            }
        }
        write_txn
            .commit()
            .map_err(|e| CartlinkError::Storage(e.to_string()))
    }

    /// Fetch one product record.
    pub fn get_product(&self, id: u64) -> Result<Option<ProductRecord>, CartlinkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(PRODUCTS)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let Some(bytes) = table
            .get(id)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        let record = postcard::from_bytes(bytes.value())
            .map_err(|e| CartlinkError::Serialization(e.to_string()))?;
        Ok(Some(record))
    }

    /// List published products, ascending by id.
    pub fn list_products(&self) -> Result<Vec<ProductSummary>, CartlinkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(PRODUCTS)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let mut summaries = Vec::new();
        for item in table
            .iter()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?
        {
            let (_, value) = item.map_err(|e| CartlinkError::Storage(e.to_string()))?;
            let record: ProductRecord = postcard::from_bytes(value.value())
                .map_err(|e| CartlinkError::Serialization(e.to_string()))?;
            if record.is_published() {
                summaries.push(ProductSummary {
                    id: record.id,
                    title: record.name,
                });
            }
        }
        Ok(summaries)
    }

    /// Parent product id of a variation, if indexed.
    fn variation_parent(&self, variation_id: u64) -> Result<Option<u64>, CartlinkError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(VARIATIONS)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?;
        let parent = table
            .get(variation_id)
            .map_err(|e| CartlinkError::Storage(e.to_string()))?
            .map(|v| v.value());
        Ok(parent)
    }
}

// =============================================================================
// SESSION CART
// =============================================================================

/// A session-backed [`CartStore`].
///
/// Mutations happen in memory; `persist_session` writes the cart back to
/// the store in one transaction.
#[derive(Debug)]
pub struct SessionCart<'a> {
    store: &'a RedbStore,
    session: String,
    items: CartSnapshot,
}

impl<'a> SessionCart<'a> {
    /// Load the cart for a session key.
    pub fn load(store: &'a RedbStore, session: &str) -> Result<Self, CartlinkError> {
        let items = store.load_cart(session)?;
        Ok(Self {
            store,
            session: session.to_string(),
            items,
        })
    }
}

impl CartStore for SessionCart<'_> {
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
        self.items.push(crate::types::CartLineItem {
            product_id,
            quantity,
            variation_id,
            variation: variation.clone(),
        });
        Ok(())
    }

    fn recalculate_totals(&mut self) -> Result<(), CartlinkError> {
        // Totals are derived by the storefront at render time; the store
        // only carries line items.
        Ok(())
    }

    fn persist_session(&mut self) -> Result<(), CartlinkError> {
        self.store.save_cart(&self.session, &self.items)
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn current_items(&self) -> CartSnapshot {
        self.items.clone()
    }
}

// =============================================================================
// INVENTORY VIEW
// =============================================================================

/// [`Inventory`] over the catalog tables.
///
/// A lookup id resolves to a product first, then to a variation through
/// the index.
#[derive(Debug)]
pub struct StoreInventory<'a>(pub &'a RedbStore);

impl Inventory for StoreInventory<'_> {
    fn stock_entry(&self, id: u64) -> Option<StockEntry> {
        if let Ok(Some(record)) = self.0.get_product(id) {
            return Some(StockEntry {
                managed: record.manage_stock,
                quantity: record.stock_quantity,
            });
        }
        let parent = self.0.variation_parent(id).ok().flatten()?;
        let record = self.0.get_product(parent).ok().flatten()?;
        record
            .variations
            .iter()
            .find(|v| v.id == id)
            .map(|v| StockEntry {
                managed: v.manage_stock,
                quantity: v.stock_quantity,
            })
    }

    fn set_stock(&mut self, id: u64, quantity: i64) -> Result<(), CartlinkError> {
        if let Some(mut record) = self.0.get_product(id)? {
            record.stock_quantity = quantity;
            return self.0.put_product(&record);
        }
        let Some(parent) = self.0.variation_parent(id)? else {
            return Err(CartlinkError::Storage(format!("no catalog entry for {id}")));
        };
        let Some(mut record) = self.0.get_product(parent)? else {
            return Err(CartlinkError::Storage(format!(
                "variation {id} indexed to missing product {parent}"
            )));
        };
        match record.variations.iter_mut().find(|v| v.id == id) {
            Some(variation) => variation.stock_quantity = quantity,
            None => {
                return Err(CartlinkError::Storage(format!(
                    "variation {id} missing from product {parent}"
                )));
            }
        }
        self.0.put_product(&record)
    }
}

// =============================================================================
// TESTS
// =============================================================================
