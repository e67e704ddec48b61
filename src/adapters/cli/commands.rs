//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the SAIGO exchange client.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::environment::Environment;
use crate::adapters::http_provider::HttpWalletProvider;
use crate::application::{
    ConnectOutcome, ConnectionManager, ExchangeSession, SessionConfig, SessionSnapshot,
};
use crate::config::{load_config, Config};
use crate::domain::connection::{short_address, ProviderSource};
use crate::domain::network::NetworkProfile;
use crate::domain::sale::{SaleParameters, WindowStatus};
use crate::ports::clock::{Clock, SystemClock};
use crate::task::ScopedTask;

/// SAIGO Exchange - swap BNB for SAIGO through an injected wallet
#[derive(Parser, Debug)]
#[command(
    name = "saigo-exchange",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Exchange BNB for SAIGO through a wallet provider",
    long_about = "Connects to a wallet provider (MetaMask-style or OKX), reads the sale \
                  distributor's parameters and sends BNB to it to take part in the SAIGO sale."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/testnet.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show detected wallets, connection, balances and sale state
    Status,

    /// Connect a wallet (prompts in the wallet)
    Connect(ConnectCmd),

    /// Show BNB and SAIGO balances of the connected account
    Balance,

    /// Show sale parameters read from the distributor
    Params,

    /// Show fundraising progress
    Progress,

    /// Quote SAIGO for a BNB amount
    Quote(QuoteCmd),

    /// Exchange BNB for SAIGO
    Swap(SwapCmd),

    /// Follow balances, progress and wallet events until Ctrl+C
    Watch,
}

/// Connect a wallet
#[derive(Parser, Debug)]
pub struct ConnectCmd {
    /// Use OKX Wallet instead of the default provider
    #[arg(long)]
    pub okx: bool,
}

/// Quote SAIGO for an amount
#[derive(Parser, Debug)]
pub struct QuoteCmd {
    /// Amount of BNB (decimal string, e.g. 0.5)
    #[arg(value_name = "AMOUNT")]
    pub amount: String,
}

/// Execute an exchange
#[derive(Parser, Debug)]
pub struct SwapCmd {
    /// Amount of BNB to send (decimal string, e.g. 0.5)
    #[arg(value_name = "AMOUNT")]
    pub amount: String,

    /// Confirm swap without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Validate and show the transaction without sending it
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let (env, http) = Environment::from_config(&config.wallet).context("Failed to set up wallet providers")?;
    let session = Arc::new(build_session(env, &config));

    match app.command {
        Command::Status => status_command(&session).await,
        Command::Connect(cmd) => connect_command(&session, cmd).await,
        Command::Balance => balance_command(&session).await,
        Command::Params => params_command(&session).await,
        Command::Progress => progress_command(&session).await,
        Command::Quote(cmd) => quote_command(&session, cmd).await,
        Command::Swap(cmd) => swap_command(&session, cmd).await,
        Command::Watch => watch_command(&session, &http, &config).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn build_session(env: Environment, config: &Config) -> ExchangeSession {
    let connection = ConnectionManager::new(env);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    ExchangeSession::new(connection, SessionConfig::from_config(config), clock)
}

/// Handle status command
async fn status_command(session: &ExchangeSession) -> Result<()> {
    tracing::info!("Fetching exchange status...");
    session.load().await;

    let env = session.connection().environment();
    let network = session.connection().network();

    println!("┌─────────────────────────────────────┐");
    println!("│  SAIGO Exchange - Status            │");
    println!("└─────────────────────────────────────┘");
    println!("  Network:  {} ({})", network.chain_name, network.chain_id);
    println!(
        "  Wallets:  ethereum={} okxwallet={}",
        detected(env.has_provider(ProviderSource::Ethereum)),
        detected(env.has_provider(ProviderSource::OkxWallet))
    );
    println!(
        "  Device:   {}{}",
        if env.is_mobile() { "mobile" } else { "desktop" },
        if env.is_in_okx_app() { " (OKX app)" } else { "" }
    );

    let snapshot = session.snapshot();
    print_connection(&snapshot);
    print_balances(&snapshot, network);
    print_params(&snapshot.params, snapshot.params_error.as_deref(), network);
    print_progress(&snapshot, network);

    Ok(())
}

fn detected(present: bool) -> &'static str {
    if present {
        "detected"
    } else {
        "absent"
    }
}

/// Handle connect command
async fn connect_command(session: &ExchangeSession, cmd: ConnectCmd) -> Result<()> {
    session.connection().attach_listeners();

    if cmd.okx {
        match session.connect_okx().await? {
            ConnectOutcome::Connected(address) => println!("✓ Connected OKX Wallet: {}", address),
            ConnectOutcome::Redirect {
                deep_link,
                fallback_url,
            } => {
                println!("OKX Wallet is not available in this browser.");
                println!("  Open in OKX app: {}", deep_link);
                println!("  Get OKX Wallet:  {}", fallback_url);
                return Ok(());
            }
        }
    } else {
        let address = session.connect(ProviderSource::Ethereum).await?;
        println!("✓ Connected: {}", address);
    }

    session.refresh_balances().await;
    let snapshot = session.snapshot();
    print_connection(&snapshot);
    print_balances(&snapshot, session.connection().network());
    Ok(())
}

/// Handle balance command
async fn balance_command(session: &ExchangeSession) -> Result<()> {
    session.start().await;
    if !session.connection().is_connected() {
        bail!("No connected account. Run `saigo-exchange connect` first.");
    }

    session.refresh_balances().await;
    print_balances(&session.snapshot(), session.connection().network());
    Ok(())
}

/// Handle params command
async fn params_command(session: &ExchangeSession) -> Result<()> {
    session.start().await;
    let snapshot = session.snapshot();
    if snapshot.connection.provider.is_none() {
        println!("No connected wallet; showing defaults.");
    }
    print_params(&snapshot.params, snapshot.params_error.as_deref(), session.connection().network());
    Ok(())
}

/// Handle progress command
async fn progress_command(session: &ExchangeSession) -> Result<()> {
    session.connection().restore_session().await;
    let provider = session.connection().state().provider;
    session.progress().refresh(provider.as_ref()).await;
    print_progress(&session.snapshot(), session.connection().network());
    Ok(())
}

/// Handle quote command
async fn quote_command(session: &ExchangeSession, cmd: QuoteCmd) -> Result<()> {
    session.start().await;
    session.set_input(&cmd.amount);

    let network = session.connection().network();
    let params = session.sale_params().params();
    let rate = session.submitter().effective_rate(&params);

    let Some(quote) = session.quote() else {
        bail!("Please enter a valid amount");
    };

    println!(
        "Quote: {} {} -> {} SAIGO",
        cmd.amount.trim(),
        network.native_currency.symbol,
        quote
    );
    println!(
        "  Rate: 1 {} = {} SAIGO{}",
        network.native_currency.symbol,
        rate,
        if params.exchange_rate.is_zero() { " (default)" } else { "" }
    );
    Ok(())
}

/// Handle swap command
async fn swap_command(session: &ExchangeSession, cmd: SwapCmd) -> Result<()> {
    session.start().await;
    if !session.connection().is_connected() {
        tracing::info!("No authorized account, requesting one");
        session.connect(ProviderSource::Ethereum).await?;
    }
    session.refresh_balances().await;
    session.set_input(&cmd.amount);

    let network = session.connection().network();
    let symbol = network.native_currency.symbol;
    let snapshot = session.snapshot();

    let tx = session.submitter().prepare(
        &snapshot.connection,
        &snapshot.input,
        &snapshot.native.balance,
        &snapshot.params,
    )?;

    println!("Swap: {} {} -> {} SAIGO", cmd.amount.trim(), symbol, snapshot.quote.unwrap_or_default());
    println!("  From: {}", tx.from);
    println!("  To:   {}", tx.to);
    println!("  Gas limit: {}", tx.gas_limit);

    if cmd.dry_run {
        println!("  Mode: DRY RUN (nothing sent)");
        println!("  Value: {} wei", tx.value);
        return Ok(());
    }

    if !cmd.yes {
        print!("Type 'yes' to send {} {}: ", cmd.amount.trim(), symbol);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if input.trim() != "yes" {
            println!("Aborted.");
            return Ok(());
        }
    }

    println!("Waiting for wallet confirmation...");
    let receipt = session.swap().await?;
    let tx_hash = receipt.tx_hash.to_string();

    println!("✓ Exchange completed successfully!");
    println!("  Transaction: {}", tx_hash);
    if let Some(url) = network.tx_url(&tx_hash) {
        println!("  Explorer:    {}", url);
    }
    print_balances(&session.snapshot(), network);
    Ok(())
}

/// Handle watch command
async fn watch_command(
    session: &Arc<ExchangeSession>,
    http: &[Arc<HttpWalletProvider>],
    config: &Config,
) -> Result<()> {
    session.start().await;

    let _watchers: Vec<ScopedTask> = http
        .iter()
        .map(|provider| provider.spawn_event_watcher(config.polling.event_interval()))
        .collect();
    let _events = session.spawn_event_loop();

    let network = session.connection().network();
    let mut native = session.native_balance().subscribe();
    let mut saigo = session.saigo_balance().subscribe();
    let mut progress = session.progress().subscribe();
    let mut events = session.connection().subscribe();

    print_connection(&session.snapshot());
    println!("Watching (Ctrl+C to stop)...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            Ok(()) = native.changed() => {
                let reading = native.borrow_and_update().clone();
                println!("[{}] {}: {}", now_label(), network.native_currency.symbol, reading.balance);
            }
            Ok(()) = saigo.changed() => {
                let reading = saigo.borrow_and_update().clone();
                println!("[{}] SAIGO: {}", now_label(), reading.balance);
            }
            Ok(()) = progress.changed() => {
                let reading = progress.borrow_and_update().clone();
                println!(
                    "[{}] Raised: {} / {} {} ({:.2}%)",
                    now_label(),
                    reading.progress.total_received_formatted(),
                    reading.progress.max_cap_formatted(),
                    network.native_currency.symbol,
                    reading.progress.percentage()
                );
            }
            Ok(event) = events.recv() => {
                println!("[{}] {:?}", now_label(), event);
            }
        }
    }

    Ok(())
}

fn now_label() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn print_connection(snapshot: &SessionSnapshot) {
    let connection = &snapshot.connection;
    println!();
    println!("  Connection: {}", connection.status);
    if let Some(address) = connection.address {
        println!("  Account:    {} ({})", short_address(&address.to_string()), address);
    }
    if let Some(source) = connection.source {
        println!("  Wallet:     {}", source.wallet_name());
    }
    if let Some(chain_id) = connection.chain_id {
        println!("  Chain:      {}", chain_id);
    }
}

fn print_balances(snapshot: &SessionSnapshot, network: &NetworkProfile) {
    println!();
    println!("  {:<6} {}", network.native_currency.symbol, snapshot.native.balance);
    println!("  {:<6} {}", "SAIGO", snapshot.saigo.balance);
    for error in [&snapshot.native.error, &snapshot.saigo.error].into_iter().flatten() {
        println!("  ! {}", error);
    }
}

fn print_params(params: &SaleParameters, error: Option<&str>, network: &NetworkProfile) {
    let symbol = network.native_currency.symbol;
    let now = SystemClock.now_unix();

    println!();
    println!("  Exchange rate: 1 {} = {} SAIGO", symbol, params.exchange_rate_formatted());
    println!("  Minimum:       {} {}", params.min_contribution_formatted(), symbol);
    println!("  Maximum:       {} {}", params.max_contribution_formatted(), symbol);
    println!("  Starts:        {}", format_timestamp(params.start_time));
    println!("  Ends:          {}", format_timestamp(params.end_time));
    let window = match params.window_status(now) {
        WindowStatus::Open => "open".to_string(),
        WindowStatus::NotStarted { starts_at } => format!("not started (opens {})", format_timestamp(starts_at)),
        WindowStatus::Ended { ended_at } => format!("ended ({})", format_timestamp(ended_at)),
    };
    println!("  Sale window:   {}", window);
    if let Some(error) = error {
        println!("  ! {}", error);
    }
}

fn print_progress(snapshot: &SessionSnapshot, network: &NetworkProfile) {
    let progress = &snapshot.progress.progress;
    println!();
    println!(
        "  Raised: {} / {} {} ({:.2}%)",
        progress.total_received_formatted(),
        progress.max_cap_formatted(),
        network.native_currency.symbol,
        progress.percentage()
    );
    if progress.is_complete() {
        println!("  Cap reached.");
    }
    if let Some(ref error) = snapshot.progress.error {
        println!("  ! {}", error);
    }
    if progress.max_cap.is_zero() && snapshot.connection.provider.is_none() {
        println!("  (connect a wallet to load progress)");
    }
}

/// Format a Unix timestamp for display; 0 means unbounded
fn format_timestamp(ts: u64) -> String {
    if ts == 0 {
        return "-".to_string();
    }
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("timestamp: {}", ts))
}
