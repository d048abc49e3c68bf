//! Command-line interface for the Forensic HR account service.
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Forensic HR - Account and session service
/// Authentication backend for the internal HR dashboard
#[derive(Parser)]
#[command(name = "forensic-hr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default when no command is given)
    #[command(alias = "--serve")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create a super admin account, or repair an existing one
    CreateAdmin {
        /// Login name
        #[arg(long)]
        username: String,

        /// Password (rotate it after the first login)
        #[arg(long)]
        password: String,

        /// Display name shown in the dashboard
        #[arg(long)]
        full_name: Option<String>,
    },

    /// Print the resolved configuration
    Config,
}

pub use commands::*;
