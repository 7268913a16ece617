//! CLI argument definitions using clap
//!
//! Commands:
//! - gatepost init --config <path>
//! - gatepost serve --config <path> [--port <port>]
//! - gatepost check --config <path> --lock <path> --address <type>=<addr>...
//!   [--ethereum-state <path>] [--lukso-state <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::gating::Address;

/// Gatepost - wallet-gated commenting service
#[derive(Parser, Debug)]
#[command(name = "gatepost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./gatepost.json")]
        config: PathBuf,
    },

    /// Start the HTTP API
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./gatepost.json")]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Evaluate a lock against addresses once and print the status
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./gatepost.json")]
        config: PathBuf,

        /// Lock JSON file
        #[arg(long)]
        lock: PathBuf,

        /// Claimed address per category, as `<category_type>=<0x address>`
        #[arg(long = "address", value_parser = parse_claim)]
        addresses: Vec<(String, Address)>,

        /// Ethereum state JSON to read instead of live RPC
        #[arg(long)]
        ethereum_state: Option<PathBuf>,

        /// LUKSO state JSON to read instead of live RPC
        #[arg(long)]
        lukso_state: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

fn parse_claim(raw: &str) -> Result<(String, Address), String> {
    let (category_type, address) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <category_type>=<address>, got '{}'", raw))?;
    if category_type.is_empty() {
        return Err("category type is empty".to_string());
    }
    let address = address.parse::<Address>().map_err(|e| e.to_string())?;
    Ok((category_type.to_string(), address))
}
