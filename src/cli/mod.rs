//! CLI module - Command-line interface for Vigil
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Vigil - Security lab API
/// An authentication and audit-trail playground with intentionally
/// exercised attack surfaces
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API daemon
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Seed demo accounts and sandbox sample files
    Seed,

    /// Manage user accounts
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all accounts with their lock state
    #[command(alias = "ls")]
    List,

    /// Clear any lock on an account
    Unlock {
        /// Account email
        email: String,
    },
}

pub use commands::*;
