//! SAIGO Exchange - command-line client for the SAIGO token sale

use anyhow::Result;
use clap::Parser;

use saigo_exchange::adapters::cli::{self, CliApp};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (provider endpoints may be set there)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    cli::execute(app).await
}
