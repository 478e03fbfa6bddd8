//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::AppState;
use crate::config;
use crate::sync::{CatalogClient, run_sync};
use cartlink_core::{CartlinkError, RedbStore, SiteRole};
use std::path::Path;

fn open_store(db_path: &Path) -> Result<RedbStore, CartlinkError> {
    RedbStore::open(db_path)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    host: &str,
    port: u16,
    config_path: Option<&Path>,
) -> Result<(), CartlinkError> {
    let store = open_store(db_path)?;

    if let Some(config_path) = config_path {
        let mut site_config = config::load_file(config_path)
            .map_err(|e| CartlinkError::Serialization(e.to_string()))?;
        if site_config.shared_secret.is_empty() {
            site_config.shared_secret = config::generate_secret();
        }
        store.save_config(&site_config)?;
        println!("Configuration seeded from {}", config_path.display());
    }

    match store.load_config()? {
        Some(config) => {
            println!("cartlink server starting...");
            println!();
            println!("Configuration:");
            println!("  Role:     {:?}", config.role);
            println!("  Enabled:  {}", config.enabled);
            println!(
                "  Peer:     {}",
                if config.has_peer() {
                    config.peer_url.as_str()
                } else {
                    "(not configured)"
                }
            );
            println!("  Host:     {}", host);
            println!("  Port:     {}", port);
        }
        None => {
            println!("Site is not initialized; every request will be served locally.");
            println!("Run `cartlink init --config <file>` to configure the handoff.");
        }
    }

    let addr = format!("{}:{}", host, port);
    let state = AppState::new(store);
    crate::api::run_server(&addr, state).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Load a configuration file into the site store.
///
/// A missing shared secret is generated here; pass `--show-secret` to
/// print it so it can be copied to the peer.
pub fn cmd_init(
    db_path: &Path,
    config_path: &Path,
    force: bool,
    show_secret: bool,
) -> Result<(), CartlinkError> {
    let mut site_config = config::load_file(config_path)
        .map_err(|e| CartlinkError::Serialization(e.to_string()))?;

    let generated = site_config.shared_secret.is_empty();
    if generated {
        site_config.shared_secret = config::generate_secret();
    }

    let store = open_store(db_path)?;
    if store.load_config()?.is_some() && !force {
        println!("Site is already initialized; pass --force to overwrite.");
        return Err(CartlinkError::ConfigMissing);
    }
    store.save_config(&site_config)?;

    println!("Site initialized:");
    println!("  Role:           {:?}", site_config.role);
    println!("  Enabled:        {}", site_config.enabled);
    println!(
        "  Peer:           {}",
        if site_config.has_peer() {
            site_config.peer_url.as_str()
        } else {
            "(not configured)"
        }
    );
    println!("  Allowed pages:  {}", site_config.allowed_pages.len());
    if generated {
        println!("  Shared secret:  (generated)");
    }
    if show_secret {
        println!("  Secret value:   {}", site_config.shared_secret);
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show site status.
pub fn cmd_status(db_path: &Path) -> Result<(), CartlinkError> {
    let store = open_store(db_path)?;

    match store.load_config()? {
        Some(config) => {
            println!("Site Status:");
            println!("  Role:           {:?}", config.role);
            println!("  Enabled:        {}", config.enabled);
            println!(
                "  Peer:           {}",
                if config.has_peer() {
                    config.peer_url.as_str()
                } else {
                    "(not configured)"
                }
            );
            println!(
                "  Secret:         {}",
                if config.shared_secret.is_empty() {
                    "(not set)"
                } else {
                    "(set)"
                }
            );
            println!("  Debug logging:  {}", config.debug_logging);
            println!("  Allowed pages:");
            for tag in &config.allowed_pages {
                println!("    - {}", tag.as_config_name());
            }
        }
        None => {
            println!("Site is not initialized.");
        }
    }

    let products = store.list_products()?;
    let activity = store.recent_activity()?;
    println!("  Products:       {}", products.len());
    println!("  Log entries:    {}", activity.len());
    Ok(())
}

// =============================================================================
// SYNC COMMAND
// =============================================================================

/// Replicate the peer's catalog into the local store.
pub async fn cmd_sync(db_path: &Path, ids: Option<&str>) -> Result<(), CartlinkError> {
    let store = open_store(db_path)?;
    let Some(config) = store.load_config()? else {
        println!("Site is not initialized; nothing to sync.");
        return Err(CartlinkError::ConfigMissing);
    };
    if config.role != SiteRole::Secondary {
        println!("Only the secondary site replicates the peer's catalog.");
        return Err(CartlinkError::ConfigMissing);
    }

    let ids: Option<Vec<u64>> = match ids {
        Some(list) => {
            let parsed: Result<Vec<u64>, _> = list
                .split(',')
                .map(|s| s.trim().parse::<u64>())
                .collect();
            Some(parsed.map_err(|e| {
                CartlinkError::Serialization(format!("invalid product id list: {e}"))
            })?)
        }
        None => None,
    };

    let client = CatalogClient::new(&config)?;
    let report = run_sync(&store, &client, ids.as_deref()).await?;
    println!(
        "Catalog sync complete: {} listed, {} fetched.",
        report.listed, report.fetched
    );
    Ok(())
}

// =============================================================================
// LOG COMMAND
// =============================================================================

/// Show the activity log, most recent first.
pub fn cmd_log(db_path: &Path, limit: usize) -> Result<(), CartlinkError> {
    let store = open_store(db_path)?;
    let entries = store.recent_activity()?;

    if entries.is_empty() {
        println!("Activity log is empty.");
        return Ok(());
    }

    for entry in entries.iter().take(limit) {
        println!("[{}] {}", entry.time, entry.message);
    }
    Ok(())
}
