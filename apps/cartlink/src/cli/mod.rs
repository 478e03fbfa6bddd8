//! # cartlink CLI Module
//!
//! This module implements the CLI interface for cartlink.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Load a configuration file into the site store
//! - `status` - Show site status
//! - `sync` - Replicate the peer's catalog into the local store
//! - `log` - Show the activity log

mod commands;

use clap::{Parser, Subcommand};
use cartlink_core::CartlinkError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// cartlink - Cross-domain cart handoff server
///
/// Two storefronts on separate domains behave as one: carts follow the
/// shopper across the pair, completions clear the sender, and stock is
/// reconciled back.
#[derive(Parser, Debug)]
#[command(name = "cartlink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the site database
    #[arg(short = 'D', long, global = true, default_value = "cartlink.redb")]
    pub database: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Seed the site store from this configuration file before serving
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Load a configuration file into the site store
    Init {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,

        /// Print the shared secret after init (it is generated when the
        /// file leaves it empty)
        #[arg(long)]
        show_secret: bool,
    },

    /// Show site status
    Status,

    /// Replicate the peer's catalog into the local store
    Sync {
        /// Replicate only these product ids (comma-separated); all when absent
        #[arg(long)]
        ids: Option<String>,
    },

    /// Show the activity log, most recent first
    Log {
        /// Maximum entries to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

/// Execute the parsed CLI.
pub async fn execute(cli: Cli) -> Result<(), CartlinkError> {
    match cli.command {
        Some(Commands::Server { host, port, config }) => {
            commands::cmd_server(&cli.database, &host, port, config.as_deref()).await
        }
        Some(Commands::Init {
            config,
            force,
            show_secret,
        }) => commands::cmd_init(&cli.database, &config, force, show_secret),
        Some(Commands::Status) | None => commands::cmd_status(&cli.database),
        Some(Commands::Sync { ids }) => commands::cmd_sync(&cli.database, ids.as_deref()).await,
        Some(Commands::Log { limit }) => commands::cmd_log(&cli.database, limit),
    }
}
