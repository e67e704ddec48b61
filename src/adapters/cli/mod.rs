//! CLI Adapter
//!
//! Command-line interface for the SAIGO exchange client.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, ConnectCmd, QuoteCmd, SwapCmd};

use anyhow::Result;

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
