//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mia - Managed software install agent for macOS
#[derive(Parser)]
#[command(name = "mia")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Managed software install agent for macOS")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Emit events as JSON records on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Process the install plan: removals first, then installs
    Run {
        /// Only process items flagged for unattended install or removal
        #[arg(long)]
        unattended: bool,

        /// Leave the OS package registry untouched when removing packages
        #[arg(long)]
        suppress_pkgutil_forget: bool,
    },

    /// Rebuild the receipt database from the OS package registry
    RebuildReceipts {
        /// Rebuild even when the database is current
        #[arg(long)]
        force: bool,
    },

    /// List the paths owned only by the given packages
    OwnedPaths {
        /// Package identifiers or names
        #[arg(required = true)]
        packages: Vec<String>,
    },
}
