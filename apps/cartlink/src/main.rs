//! # cartlink - Cross-Domain Cart Handoff Server
//!
//! The main binary for the cartlink handoff pair.
//!
//! This application provides:
//! - The redirect gateway and REST protocol surface (axum-based)
//! - CLI interface for site operations
//! - Outbound clients (stock push, catalog replication)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/cartlink (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │  │   CLI       │    │  Gateway +  │    │ Outbound Clients │   │
//! │  │  (clap)     │    │  API (axum) │    │ (push / sync)    │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘   │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                   ┌────────────────┐                           │
//! │                   │ cartlink-core  │                           │
//! │                   │  (THE LOGIC)   │                           │
//! │                   └────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Configure the site, then start the HTTP server
//! cartlink init --config site.toml
//! cartlink server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! cartlink status
//! cartlink sync
//! cartlink log --limit 20
//! ```

use cartlink::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — CARTLINK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CARTLINK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartlink=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the cartlink startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗ █████╗ ██████╗ ████████╗██╗     ██╗███╗   ██╗██╗  ██╗
  ██╔════╝██╔══██╗██╔══██╗╚══██╔══╝██║     ██║████╗  ██║██║ ██╔╝
  ██║     ███████║██████╔╝   ██║   ██║     ██║██╔██╗ ██║█████╔╝
  ██║     ██╔══██║██╔══██╗   ██║   ██║     ██║██║╚██╗██║██╔═██╗
  ╚██████╗██║  ██║██║  ██║   ██║   ███████╗██║██║ ╚████║██║  ██╗
   ╚═════╝╚═╝  ╚═╝╚═╝  ╚═╝   ╚═╝   ╚══════╝╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝

  Cross-Domain Cart Handoff v{}

  One Cart • Two Domains • No Lost Checkouts
"#,
        env!("CARGO_PKG_VERSION")
    );
}
