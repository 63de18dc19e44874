//! CLI command definitions for due-date-hook
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod register;

use clap::{Parser, Subcommand};
use register::RegisterArgs;

/// Asana due-date automation webhook server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Address to bind the webhook server to (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port for the webhook server (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the webhook server (default if no subcommand given)
    Serve,

    /// Register the webhook with Asana for a project
    RegisterWebhook(RegisterArgs),
}
