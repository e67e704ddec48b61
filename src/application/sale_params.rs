//! Sale Parameter Fetcher
//!
//! Reads the distributor's rate, contribution bounds and sale window. The
//! five calls run in order; the first failure ends the cycle and values
//! already read stay in place.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use parking_lot::RwLock;

use super::fetch::FetchError;
use crate::adapters::contracts::ISaleDistributor;
use crate::adapters::web3::Web3Client;
use crate::domain::sale::SaleParameters;

#[derive(Debug, Default)]
struct Cached {
    params: SaleParameters,
    error: Option<String>,
    loaded: bool,
}

#[derive(Debug)]
pub struct SaleParamsFetcher {
    contract: Address,
    cached: RwLock<Cached>,
}

impl SaleParamsFetcher {
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            cached: RwLock::new(Cached::default()),
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Last known values; zero until fetched
    pub fn params(&self) -> SaleParameters {
        self.cached.read().params
    }

    pub fn error(&self) -> Option<String> {
        self.cached.read().error.clone()
    }

    /// Whether a full cycle has completed at least once
    pub fn is_loaded(&self) -> bool {
        self.cached.read().loaded
    }

    /// Forget everything fetched so far
    pub fn reset(&self) {
        *self.cached.write() = Cached::default();
    }

    /// Run one fetch cycle. Without a provider nothing happens.
    pub async fn refresh(&self, provider: Option<&Web3Client>) -> Result<SaleParameters, FetchError> {
        let Some(client) = provider else {
            return Ok(self.params());
        };

        self.cached.write().error = None;
        match self.run_cycle(client).await {
            Ok(()) => {
                let mut cached = self.cached.write();
                cached.loaded = true;
                tracing::debug!("Sale parameters: {:?}", cached.params);
                Ok(cached.params)
            }
            Err(err) => {
                tracing::warn!("{}", err);
                self.cached.write().error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_cycle(&self, client: &Web3Client) -> Result<(), FetchError> {
        let rate = self.read(client, ISaleDistributor::exchangeRateCall {}).await?._0;
        self.cached.write().params.exchange_rate = rate;

        let min = self.read(client, ISaleDistributor::minBnbAmountCall {}).await?._0;
        self.cached.write().params.min_contribution = min;

        let max = self.read(client, ISaleDistributor::maxBnbAmountCall {}).await?._0;
        self.cached.write().params.max_contribution = max;

        let start = self.read(client, ISaleDistributor::startTimestampCall {}).await?._0;
        self.cached.write().params.start_time = to_unix_seconds(start);

        let end = self.read(client, ISaleDistributor::endTimestampCall {}).await?._0;
        self.cached.write().params.end_time = to_unix_seconds(end);

        Ok(())
    }

    async fn read<C: SolCall + Send>(&self, client: &Web3Client, call: C) -> Result<C::Return, FetchError> {
        client
            .call(self.contract, call)
            .await
            .map_err(|source| FetchError::SaleParameters {
                call: C::SIGNATURE,
                source,
            })
    }
}

/// Timestamps beyond u64 are treated as "never"
pub(crate) fn to_unix_seconds(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::MockWalletProvider;
    use crate::ports::wallet::ProviderError;
    use alloy_sol_types::SolValue;
    use std::sync::Arc;

    const ETHER: u128 = 1_000_000_000_000_000_000;

    fn distributor() -> Address {
        Address::repeat_byte(0x22)
    }

    fn encoded(value: u128) -> Vec<u8> {
        U256::from(value).abi_encode()
    }

    fn full_mock() -> MockWalletProvider {
        MockWalletProvider::default()
            .with_call_result(ISaleDistributor::exchangeRateCall::SELECTOR, encoded(14_285))
            .with_call_result(ISaleDistributor::minBnbAmountCall::SELECTOR, encoded(ETHER / 10))
            .with_call_result(ISaleDistributor::maxBnbAmountCall::SELECTOR, encoded(5 * ETHER))
            .with_call_result(ISaleDistributor::startTimestampCall::SELECTOR, encoded(1_700_000_000))
            .with_call_result(ISaleDistributor::endTimestampCall::SELECTOR, encoded(1_800_000_000))
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let mock = Arc::new(full_mock());
        let client = Web3Client::new(mock.clone());
        let fetcher = SaleParamsFetcher::new(distributor());

        let params = fetcher.refresh(Some(&client)).await.unwrap();

        assert_eq!(params.exchange_rate, U256::from(14_285u64));
        assert_eq!(params.min_contribution_formatted(), "0.1");
        assert_eq!(params.max_contribution_formatted(), "5.0");
        assert_eq!(params.start_time, 1_700_000_000);
        assert_eq!(params.end_time, 1_800_000_000);
        assert!(fetcher.is_loaded());
        assert!(fetcher.error().is_none());
        assert_eq!(mock.call_count("eth_call"), 5);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_calls() {
        let mock = Arc::new(full_mock().with_call_error(
            ISaleDistributor::maxBnbAmountCall::SELECTOR,
            ProviderError::from_rpc(-32000, "execution reverted"),
        ));
        let client = Web3Client::new(mock.clone());
        let fetcher = SaleParamsFetcher::new(distributor());

        let err = fetcher.refresh(Some(&client)).await.unwrap_err();

        assert!(matches!(err, FetchError::SaleParameters { call: "maxBnbAmount()", .. }));
        assert_eq!(mock.call_count("eth_call"), 3);

        let params = fetcher.params();
        assert_eq!(params.exchange_rate, U256::from(14_285u64));
        assert_eq!(params.min_contribution, U256::from(ETHER / 10));
        assert_eq!(params.max_contribution, U256::ZERO);
        assert_eq!(params.end_time, 0);
        assert!(fetcher.error().unwrap().contains("execution reverted"));
        assert!(!fetcher.is_loaded());
    }

    #[tokio::test]
    async fn test_stale_values_survive_later_failure() {
        let mock = Arc::new(full_mock());
        let client = Web3Client::new(mock.clone());
        let fetcher = SaleParamsFetcher::new(distributor());
        fetcher.refresh(Some(&client)).await.unwrap();

        mock.set_failure("eth_call", ProviderError::transport("timeout"));
        assert!(fetcher.refresh(Some(&client)).await.is_err());

        let params = fetcher.params();
        assert_eq!(params.max_contribution, U256::from(5 * ETHER));
        assert_eq!(params.end_time, 1_800_000_000);
    }

    #[tokio::test]
    async fn test_no_provider_is_noop() {
        let fetcher = SaleParamsFetcher::new(distributor());
        let params = fetcher.refresh(None).await.unwrap();
        assert_eq!(params, SaleParameters::default());
        assert!(fetcher.error().is_none());
    }

    #[test]
    fn test_oversized_timestamp() {
        assert_eq!(to_unix_seconds(U256::MAX), u64::MAX);
        assert_eq!(to_unix_seconds(U256::from(5u64)), 5);
    }
}
