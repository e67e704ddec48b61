//! Exchange Submitter
//!
//! Validates an input amount, sends the value transfer to the sale contract
//! and waits for the receipt. Also computes the SAIGO quote for an input.

use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;
use tokio::sync::watch;

use super::connection::ConnectionState;
use super::in_flight::InFlight;
use crate::adapters::web3::TransactionRequest;
use crate::domain::exchange::{validate_swap, SwapRequest, ValidationError};
use crate::domain::sale::SaleParameters;
use crate::domain::token::TokenDescriptor;
use crate::ports::clock::Clock;
use crate::ports::wallet::{ProviderError, ProviderErrorKind};

/// Gas ceiling for the value transfer
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// SAIGO per native unit shown before the contract rate is known
pub const FALLBACK_EXCHANGE_RATE: Decimal = dec!(14285.7);

pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("An exchange is already being submitted")]
    InProgress,
    #[error("Transaction was rejected by user")]
    UserRejected,
    #[error("Insufficient {symbol} for transaction (including gas fees)")]
    InsufficientFundsForGas { symbol: String },
    #[error("Transaction failed. Please try again.")]
    TransactionFailed { tx_hash: B256 },
    #[error("{0}")]
    Provider(String),
}

impl SwapError {
    fn from_provider(err: ProviderError, symbol: &str) -> Self {
        match err.kind {
            ProviderErrorKind::UserRejected => SwapError::UserRejected,
            ProviderErrorKind::InsufficientFunds => SwapError::InsufficientFundsForGas {
                symbol: symbol.to_string(),
            },
            _ if err.message.is_empty() => SwapError::Provider("Failed to complete exchange".to_string()),
            _ => SwapError::Provider(err.message),
        }
    }
}

/// Confirmed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    pub tx_hash: B256,
    pub amount_wei: U256,
    pub block_number: Option<u64>,
}

/// Where the current submission is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwapStage {
    #[default]
    Idle,
    /// Waiting for the wallet to sign and broadcast
    Submitting,
    /// Broadcast, waiting for confirmation
    Pending { tx_hash: B256 },
}

/// Submission settings
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub sale_contract: Address,
    pub gas_limit: u64,
    pub receipt_interval: Duration,
    pub fallback_rate: Decimal,
}

impl SubmitterConfig {
    pub fn new(sale_contract: Address) -> Self {
        Self {
            sale_contract,
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_interval: RECEIPT_POLL_INTERVAL,
            fallback_rate: FALLBACK_EXCHANGE_RATE,
        }
    }
}

pub struct ExchangeSubmitter {
    config: SubmitterConfig,
    native: TokenDescriptor,
    clock: Arc<dyn Clock>,
    submitting: AtomicBool,
    stage: watch::Sender<SwapStage>,
}

impl ExchangeSubmitter {
    pub fn new(config: SubmitterConfig, native: TokenDescriptor, clock: Arc<dyn Clock>) -> Self {
        let (stage, _) = watch::channel(SwapStage::Idle);
        Self {
            config,
            native,
            clock,
            submitting: AtomicBool::new(false),
            stage,
        }
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    pub fn stage(&self) -> SwapStage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<SwapStage> {
        self.stage.subscribe()
    }

    pub fn is_submitting(&self) -> bool {
        self.stage() != SwapStage::Idle
    }

    /// Run every pre-submission check and build the transaction
    pub fn prepare(
        &self,
        connection: &ConnectionState,
        amount: &str,
        balance: &str,
        params: &SaleParameters,
    ) -> Result<TransactionRequest, SwapError> {
        let request = SwapRequest {
            connected: connection.is_connected(),
            has_signer: connection.signer.is_some(),
            amount,
            balance,
            params,
            now: self.clock.now_unix(),
            decimals: self.native.decimals,
            symbol: &self.native.symbol,
        };
        let value = validate_swap(&request)?;

        let from = connection.address.ok_or(ValidationError::NotConnected)?;
        Ok(TransactionRequest {
            from,
            to: self.config.sale_contract,
            value,
            gas_limit: self.config.gas_limit,
        })
    }

    /// Validate, send and wait for confirmation
    pub async fn submit(
        &self,
        connection: &ConnectionState,
        amount: &str,
        balance: &str,
        params: &SaleParameters,
    ) -> Result<SwapReceipt, SwapError> {
        let _guard = InFlight::try_acquire(&self.submitting).ok_or(SwapError::InProgress)?;

        let tx = self.prepare(connection, amount, balance, params)?;
        let signer = connection
            .signer
            .as_ref()
            .ok_or(SwapError::Validation(ValidationError::NotConnected))?;

        let result: Result<SwapReceipt, SwapError> = async {
            self.stage.send_replace(SwapStage::Submitting);
            tracing::info!(
                "Submitting {} {} from {} to {}",
                amount.trim(),
                self.native.symbol,
                tx.from,
                tx.to
            );

            let tx_hash = signer
                .send_transaction(&tx)
                .await
                .map_err(|e| SwapError::from_provider(e, &self.native.symbol))?;
            self.stage.send_replace(SwapStage::Pending { tx_hash });
            tracing::info!("Transaction submitted. Waiting for confirmation... ({})", tx_hash);

            let receipt = signer
                .wait_for_receipt(tx_hash, self.config.receipt_interval)
                .await
                .map_err(|e| SwapError::from_provider(e, &self.native.symbol))?;

            if !receipt.status {
                tracing::error!("Transaction {} failed on-chain", tx_hash);
                return Err(SwapError::TransactionFailed { tx_hash });
            }

            tracing::info!("Exchange completed successfully ({})", tx_hash);
            Ok(SwapReceipt {
                tx_hash,
                amount_wei: tx.value,
                block_number: receipt.block_number,
            })
        }
        .await;

        self.stage.send_replace(SwapStage::Idle);
        if let Err(e) = &result {
            tracing::warn!("Swap error: {}", e);
        }
        result
    }

    /// SAIGO received for `amount`, using the contract rate once loaded
    pub fn quote(&self, amount: &str, params: &SaleParameters) -> Option<Decimal> {
        let amount = amount.trim();
        if amount.is_empty() {
            return None;
        }
        let amount = Decimal::from_str(amount).ok()?;
        let rate = self.effective_rate(params);
        amount.checked_mul(rate).map(|q| q.normalize())
    }

    pub fn effective_rate(&self, params: &SaleParameters) -> Decimal {
        if params.exchange_rate.is_zero() {
            return self.config.fallback_rate;
        }
        Decimal::from_str(&params.exchange_rate.to_string()).unwrap_or(self.config.fallback_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::web3::{Signer, Web3Client};
    use crate::domain::connection::{ConnectionStatus, ProviderSource};
    use crate::domain::network::BNB_TESTNET;
    use crate::ports::clock::MockClock;
    use crate::ports::mocks::{FixedClock, MockWalletProvider};

    const ETHER: u128 = 1_000_000_000_000_000_000;
    const NOW: u64 = 1_750_000_000;

    fn sender() -> Address {
        Address::repeat_byte(0x0a)
    }

    fn sale_contract() -> Address {
        Address::repeat_byte(0x5a)
    }

    fn params() -> SaleParameters {
        SaleParameters {
            exchange_rate: U256::ZERO,
            min_contribution: U256::from(ETHER / 10),
            max_contribution: U256::from(5 * ETHER),
            start_time: NOW - 100,
            end_time: NOW + 100,
        }
    }

    fn connected(mock: Arc<MockWalletProvider>) -> ConnectionState {
        let client = Web3Client::new(mock);
        ConnectionState {
            status: ConnectionStatus::Connected,
            address: Some(sender()),
            chain_id: Some(97),
            source: Some(ProviderSource::Ethereum),
            signer: Some(Signer::new(client.clone())),
            provider: Some(client),
        }
    }

    fn submitter(clock: Arc<dyn Clock>) -> ExchangeSubmitter {
        let mut config = SubmitterConfig::new(sale_contract());
        config.receipt_interval = Duration::from_millis(1);
        ExchangeSubmitter::new(config, TokenDescriptor::native(&BNB_TESTNET), clock)
    }

    #[tokio::test]
    async fn test_successful_swap() {
        let mock = Arc::new(MockWalletProvider::default());
        let submitter = submitter(FixedClock::new(NOW));

        let receipt = submitter
            .submit(&connected(mock.clone()), "3.5", "10.0", &params())
            .await
            .unwrap();

        assert_eq!(receipt.amount_wei, U256::from(3 * ETHER + ETHER / 2));
        let sent = mock.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["to"], sale_contract().to_string());
        assert_eq!(sent[0]["from"], sender().to_string());
        assert_eq!(sent[0]["gas"], "0x30d40");
        assert_eq!(submitter.stage(), SwapStage::Idle);
    }

    #[tokio::test]
    async fn test_validation_blocks_transfer() {
        let mock = Arc::new(MockWalletProvider::default());
        let submitter = submitter(FixedClock::new(NOW));
        let state = connected(mock.clone());

        let err = submitter.submit(&state, "6.0", "10.0", &params()).await.unwrap_err();
        assert_eq!(err.to_string(), "Maximum contribution is 5.0 tBNB");

        let err = submitter.submit(&state, "0.05", "10.0", &params()).await.unwrap_err();
        assert_eq!(err.to_string(), "Minimum contribution is 0.1 tBNB");

        let err = submitter.submit(&state, "4", "2.0", &params()).await.unwrap_err();
        assert_eq!(err, SwapError::Validation(ValidationError::InsufficientBalance { symbol: "tBNB".to_string() }));

        let err = submitter
            .submit(&ConnectionState::default(), "1", "10.0", &params())
            .await
            .unwrap_err();
        assert_eq!(err, SwapError::Validation(ValidationError::NotConnected));

        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_window_checked_with_clock() {
        let mock = Arc::new(MockWalletProvider::default());
        let mut clock = MockClock::new();
        clock.expect_now_unix().return_const(NOW + 101);
        let submitter = submitter(Arc::new(clock));

        let err = submitter
            .submit(&connected(mock.clone()), "3.5", "10.0", &params())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Validation(ref v) if v.is_window_closed()));
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_receipt() {
        let mock = Arc::new(MockWalletProvider::default().with_receipt_status(0));
        let submitter = submitter(FixedClock::new(NOW));

        let err = submitter
            .submit(&connected(mock), "1.0", "10.0", &params())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::TransactionFailed { .. }));
        assert_eq!(err.to_string(), "Transaction failed. Please try again.");
    }

    #[tokio::test]
    async fn test_provider_error_classification() {
        let submitter = submitter(FixedClock::new(NOW));

        let rejected = Arc::new(
            MockWalletProvider::default().with_failure("eth_sendTransaction", ProviderError::user_rejected()),
        );
        let err = submitter.submit(&connected(rejected), "1", "10", &params()).await.unwrap_err();
        assert_eq!(err, SwapError::UserRejected);

        let broke = Arc::new(
            MockWalletProvider::default().with_failure("eth_sendTransaction", ProviderError::insufficient_funds()),
        );
        let err = submitter.submit(&connected(broke), "1", "10", &params()).await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient tBNB for transaction (including gas fees)");

        let other = Arc::new(MockWalletProvider::default().with_failure(
            "eth_sendTransaction",
            ProviderError::from_rpc(-32603, "nonce too low"),
        ));
        let err = submitter.submit(&connected(other), "1", "10", &params()).await.unwrap_err();
        assert_eq!(err, SwapError::Provider("nonce too low".to_string()));
    }

    #[test]
    fn test_prepare_builds_transaction() {
        let submitter = submitter(FixedClock::new(NOW));
        let tx = submitter
            .prepare(&connected(Arc::new(MockWalletProvider::default())), "0.1", "1", &params())
            .unwrap();
        assert_eq!(tx.to, sale_contract());
        assert_eq!(tx.value, U256::from(ETHER / 10));
        assert_eq!(tx.gas_limit, DEFAULT_GAS_LIMIT);
    }

    #[test]
    fn test_quote() {
        let submitter = submitter(FixedClock::new(NOW));

        assert_eq!(submitter.quote("1", &params()), Some(dec!(14285.7)));
        assert_eq!(submitter.quote("0.5", &params()), Some(dec!(7142.85)));
        assert_eq!(submitter.quote("", &params()), None);
        assert_eq!(submitter.quote("abc", &params()), None);

        let loaded = SaleParameters {
            exchange_rate: U256::from(20_000u64),
            ..params()
        };
        assert_eq!(submitter.quote("2.5", &loaded), Some(dec!(50000)));
    }
}
