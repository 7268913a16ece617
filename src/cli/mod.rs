//! CLI module for gatepost
//!
//! Provides command-line interface for:
//! - init: Write a default config file
//! - serve: Run the HTTP API
//! - check: One-shot lock evaluation

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check, init, live_collector, run, run_command, serve, OfflineState};
pub use errors::{CliError, CliErrorCode, CliResult};
