//! Persistent storage backends.

mod redb_store;

pub use redb_store::{RedbStore, SessionCart, StoreInventory};
