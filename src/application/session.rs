//! Exchange Session
//!
//! Everything one exchange screen needs: the connection, both balances,
//! sale parameters, fundraising progress, the input amount and the
//! submitter. Keeps the fetchers bound to whatever the connection holds.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::broadcast::error::RecvError;

use super::balance::{BalanceReading, BalanceTracker};
use super::connection::{ConnectError, ConnectOutcome, ConnectionManager, ConnectionState, SessionEvent};
use super::exchange::{ExchangeSubmitter, SubmitterConfig, SwapError, SwapReceipt};
use super::progress::{ProgressReading, ProgressTracker};
use super::sale_params::SaleParamsFetcher;
use crate::config::Config;
use crate::domain::connection::ProviderSource;
use crate::domain::sale::SaleParameters;
use crate::domain::token::TokenDescriptor;
use crate::ports::clock::Clock;
use crate::task::ScopedTask;

/// Addresses and cadences for a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub submitter: SubmitterConfig,
    pub token_address: Address,
    pub balance_interval: Duration,
    pub progress_interval: Duration,
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Self {
        let mut submitter = SubmitterConfig::new(config.sale.contract_address);
        submitter.gas_limit = config.sale.gas_limit;
        submitter.fallback_rate = config.sale.fallback_rate();
        submitter.receipt_interval = config.polling.receipt_interval();

        Self {
            submitter,
            token_address: config.sale.token_address,
            balance_interval: config.polling.balance_interval(),
            progress_interval: config.polling.progress_interval(),
        }
    }
}

/// Point-in-time view for rendering
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub native: BalanceReading,
    pub saigo: BalanceReading,
    pub params: SaleParameters,
    pub params_error: Option<String>,
    pub progress: ProgressReading,
    pub input: String,
    pub quote: Option<Decimal>,
}

pub struct ExchangeSession {
    connection: ConnectionManager,
    native_balance: BalanceTracker,
    saigo_balance: BalanceTracker,
    sale_params: SaleParamsFetcher,
    progress: ProgressTracker,
    submitter: ExchangeSubmitter,
    input: Mutex<String>,
}

impl ExchangeSession {
    pub fn new(connection: ConnectionManager, config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let native = TokenDescriptor::native(connection.network());
        let saigo = TokenDescriptor::saigo(config.token_address);

        Self {
            native_balance: BalanceTracker::new(native.clone(), config.balance_interval),
            saigo_balance: BalanceTracker::new(saigo, config.balance_interval),
            sale_params: SaleParamsFetcher::new(config.submitter.sale_contract),
            progress: ProgressTracker::new(config.submitter.sale_contract, config.progress_interval),
            submitter: ExchangeSubmitter::new(config.submitter, native, clock),
            input: Mutex::new(String::new()),
            connection,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn native_balance(&self) -> &BalanceTracker {
        &self.native_balance
    }

    pub fn saigo_balance(&self) -> &BalanceTracker {
        &self.saigo_balance
    }

    pub fn sale_params(&self) -> &SaleParamsFetcher {
        &self.sale_params
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn submitter(&self) -> &ExchangeSubmitter {
        &self.submitter
    }

    /// Attach provider listeners, pick up an authorized account and load
    /// what can be loaded
    pub async fn start(&self) {
        self.connection.attach_listeners();
        self.connection.restore_session().await;
        self.sync_bindings();
        self.refresh_params().await;
    }

    /// Restore the wallet session and fetch everything once, leaving the
    /// pollers idle. For callers that read a single snapshot and exit.
    pub async fn load(&self) {
        self.connection.restore_session().await;
        let state = self.connection.state();
        self.refresh_params().await;
        self.native_balance.load(state.address, state.provider.as_ref()).await;
        self.saigo_balance.load(state.address, state.provider.as_ref()).await;
        self.progress.refresh(state.provider.as_ref()).await;
    }

    pub async fn connect(&self, source: ProviderSource) -> Result<Address, ConnectError> {
        let address = self.connection.connect(source).await?;
        self.sync_bindings();
        self.refresh_params().await;
        Ok(address)
    }

    pub async fn connect_okx(&self) -> Result<ConnectOutcome, ConnectError> {
        let outcome = self.connection.connect_okx().await?;
        if matches!(outcome, ConnectOutcome::Connected(_)) {
            self.sync_bindings();
            self.refresh_params().await;
        }
        Ok(outcome)
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
        self.sync_bindings();
    }

    /// Bind the balance and progress pollers to the current connection
    pub fn sync_bindings(&self) {
        let state = self.connection.state();
        self.native_balance.bind(state.address, state.provider.clone());
        self.saigo_balance.bind(state.address, state.provider.clone());
        self.progress.bind(state.provider);
    }

    pub async fn refresh_params(&self) -> SaleParameters {
        let provider = self.connection.state().provider;
        // failures are recorded on the fetcher
        let _ = self.sale_params.refresh(provider.as_ref()).await;
        self.sale_params.params()
    }

    pub async fn refresh_balances(&self) {
        self.native_balance.refresh().await;
        self.saigo_balance.refresh().await;
    }

    /// React to a connection notification
    pub async fn handle_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected { .. } => {
                self.sync_bindings();
                self.refresh_params().await;
            }
            SessionEvent::AccountSwitched { .. } | SessionEvent::Disconnected => self.sync_bindings(),
            SessionEvent::ReloadRequired { chain_id } => {
                tracing::info!("Reloading session after switch to chain {}", chain_id);
                self.reload().await;
            }
        }
    }

    /// Drop every derived value and start over
    pub async fn reload(&self) {
        self.sync_bindings();
        self.sale_params.reset();
        self.progress.reset();
        self.set_input("");
        self.connection.restore_session().await;
        self.sync_bindings();
        self.refresh_params().await;
    }

    /// Apply connection notifications until the handle is dropped
    pub fn spawn_event_loop(self: &Arc<Self>) -> ScopedTask {
        let session = Arc::clone(self);
        let mut events = self.connection.subscribe();
        ScopedTask::spawn("session-events", async move {
            loop {
                match events.recv().await {
                    Ok(event) => session.handle_event(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} session events, resyncing", skipped);
                        session.sync_bindings();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn input(&self) -> String {
        self.input.lock().clone()
    }

    pub fn set_input(&self, amount: &str) {
        *self.input.lock() = amount.to_string();
    }

    pub fn quote(&self) -> Option<Decimal> {
        self.submitter.quote(&self.input(), &self.sale_params.params())
    }

    /// Submit the current input. On success both balances are re-fetched
    /// and the input is cleared.
    pub async fn swap(&self) -> Result<SwapReceipt, SwapError> {
        let connection = self.connection.state();
        let amount = self.input();
        let balance = self.native_balance.current().balance;
        let params = self.sale_params.params();

        let receipt = self.submitter.submit(&connection, &amount, &balance, &params).await?;

        self.refresh_balances().await;
        self.set_input("");
        Ok(receipt)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.connection.state(),
            native: self.native_balance.current(),
            saigo: self.saigo_balance.current(),
            params: self.sale_params.params(),
            params_error: self.sale_params.error(),
            progress: self.progress.current(),
            input: self.input(),
            quote: self.quote(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::contracts::{ISaleDistributor, IERC20};
    use crate::adapters::environment::Environment;
    use crate::domain::network::BNB_TESTNET;
    use crate::ports::mocks::{FixedClock, MockWalletProvider};
    use alloy_primitives::U256;
    use alloy_sol_types::{SolCall, SolValue};

    const ETHER: u128 = 1_000_000_000_000_000_000;

    fn user() -> Address {
        Address::repeat_byte(0x0c)
    }

    fn session_config() -> SessionConfig {
        let mut submitter = SubmitterConfig::new(Address::repeat_byte(0x5a));
        submitter.receipt_interval = Duration::from_millis(1);
        SessionConfig {
            submitter,
            token_address: Address::repeat_byte(0x12),
            balance_interval: Duration::from_secs(15),
            progress_interval: Duration::from_secs(30),
        }
    }

    fn wallet() -> Arc<MockWalletProvider> {
        Arc::new(
            MockWalletProvider::new("ethereum")
                .with_accounts(vec![user()])
                .with_chain_id(97)
                .with_balance(user(), U256::from(10 * ETHER))
                .with_call_result(IERC20::balanceOfCall::SELECTOR, U256::ZERO.abi_encode())
                .with_call_result(ISaleDistributor::exchangeRateCall::SELECTOR, U256::from(14_285u64).abi_encode())
                .with_call_result(ISaleDistributor::minBnbAmountCall::SELECTOR, U256::from(ETHER / 10).abi_encode())
                .with_call_result(ISaleDistributor::maxBnbAmountCall::SELECTOR, U256::from(5 * ETHER).abi_encode())
                .with_call_result(ISaleDistributor::startTimestampCall::SELECTOR, U256::ZERO.abi_encode())
                .with_call_result(ISaleDistributor::endTimestampCall::SELECTOR, U256::ZERO.abi_encode())
                .with_call_result(ISaleDistributor::maxBnbCapCall::SELECTOR, U256::from(7_000 * ETHER).abi_encode())
                .with_call_result(ISaleDistributor::totalBnbReceivedCall::SELECTOR, U256::ZERO.abi_encode()),
        )
    }

    fn session(mock: Arc<MockWalletProvider>) -> ExchangeSession {
        let env = Environment::new("Mozilla/5.0 (X11; Linux x86_64)", "").with_ethereum(mock);
        let connection = ConnectionManager::with_network(env, &BNB_TESTNET);
        ExchangeSession::new(connection, session_config(), FixedClock::new(1_750_000_000))
    }

    #[tokio::test]
    async fn test_connect_binds_fetchers() {
        let mock = wallet();
        let session = session(mock.clone());

        session.connect(ProviderSource::Ethereum).await.unwrap();
        tokio::task::yield_now().await;

        assert!(session.native_balance().is_polling());
        assert!(session.saigo_balance().is_polling());
        assert!(session.progress().is_polling());
        assert!(session.sale_params().is_loaded());

        session.disconnect();
        assert!(!session.native_balance().is_polling());
        assert!(!session.progress().is_polling());
    }

    #[tokio::test]
    async fn test_load_fetches_once_without_polling() {
        let mock = wallet();
        let session = session(mock.clone());

        session.load().await;
        tokio::task::yield_now().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.connection.address, Some(user()));
        assert_eq!(snapshot.native.balance, "10.0");
        assert_eq!(snapshot.progress.progress.max_cap, U256::from(7_000 * ETHER));
        assert!(session.sale_params().is_loaded());

        assert_eq!(mock.call_count("eth_getBalance"), 1);
        assert!(!session.native_balance().is_polling());
        assert!(!session.saigo_balance().is_polling());
        assert!(!session.progress().is_polling());
    }

    #[tokio::test]
    async fn test_load_without_wallet_leaves_defaults() {
        let env = Environment::new("Mozilla/5.0 (X11; Linux x86_64)", "");
        let connection = ConnectionManager::with_network(env, &BNB_TESTNET);
        let session = ExchangeSession::new(connection, session_config(), FixedClock::new(1_750_000_000));

        session.load().await;

        let snapshot = session.snapshot();
        assert!(snapshot.connection.address.is_none());
        assert_eq!(snapshot.native, BalanceReading::default());
        assert!(!session.progress().is_polling());
    }

    #[tokio::test]
    async fn test_quote_follows_input() {
        let session = session(wallet());
        session.set_input("2");
        assert_eq!(session.quote(), Some(rust_decimal_macros::dec!(28571.4)));

        session.connect(ProviderSource::Ethereum).await.unwrap();
        assert_eq!(session.quote(), Some(rust_decimal_macros::dec!(28570)));
    }

    #[tokio::test]
    async fn test_swap_clears_input_and_refreshes() {
        let mock = wallet();
        let session = session(mock.clone());
        session.connect(ProviderSource::Ethereum).await.unwrap();
        session.refresh_balances().await;
        let fetched_before = mock.call_count("eth_getBalance");

        session.set_input("3.5");
        let receipt = session.swap().await.unwrap();

        assert_eq!(receipt.amount_wei, U256::from(3 * ETHER + ETHER / 2));
        assert_eq!(session.input(), "");
        assert!(mock.call_count("eth_getBalance") > fetched_before);
    }

    #[tokio::test]
    async fn test_failed_swap_keeps_input() {
        let session = session(wallet());
        session.connect(ProviderSource::Ethereum).await.unwrap();
        session.refresh_balances().await;

        session.set_input("6.0");
        assert!(session.swap().await.is_err());
        assert_eq!(session.input(), "6.0");
    }

    #[tokio::test]
    async fn test_reload_after_chain_change() {
        let mock = wallet();
        let session = Arc::new(session(mock.clone()));
        session.start().await;
        session.connect(ProviderSource::Ethereum).await.unwrap();
        session.set_input("1");

        mock.emit_chain_changed(56);
        session.handle_event(&SessionEvent::ReloadRequired { chain_id: 56 }).await;

        // the account is still authorized, so the session comes back
        assert!(session.connection().is_connected());
        assert_eq!(session.input(), "");
        assert!(session.sale_params().is_loaded());
    }
}
