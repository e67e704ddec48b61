//! Fundraising Progress
//!
//! Polls the distributor's cap and running total.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::fetch::FetchError;
use crate::adapters::contracts::ISaleDistributor;
use crate::adapters::web3::Web3Client;
use crate::domain::sale::FundraisingProgress;
use crate::task::ScopedTask;

pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressReading {
    pub progress: FundraisingProgress,
    pub error: Option<String>,
}

/// One cycle: `maxBnbCap` then `totalBnbReceived`. Each value lands in
/// `reading` as soon as it is read; a failure stops the cycle.
async fn fetch_progress(
    contract: Address,
    client: &Web3Client,
    reading: &watch::Sender<ProgressReading>,
) -> Result<FundraisingProgress, FetchError> {
    reading.send_modify(|r| r.error = None);

    let max_cap = client
        .call(contract, ISaleDistributor::maxBnbCapCall {})
        .await
        .map_err(|source| FetchError::Progress {
            call: "maxBnbCap()",
            source,
        })?
        ._0;
    reading.send_modify(|r| r.progress.max_cap = max_cap);

    let total_received = client
        .call(contract, ISaleDistributor::totalBnbReceivedCall {})
        .await
        .map_err(|source| FetchError::Progress {
            call: "totalBnbReceived()",
            source,
        })?
        ._0;
    reading.send_modify(|r| r.progress.total_received = total_received);

    Ok(reading.borrow().progress)
}

async fn run_cycle(contract: Address, client: &Web3Client, reading: &watch::Sender<ProgressReading>) {
    match fetch_progress(contract, client, reading).await {
        Ok(progress) => tracing::debug!(
            "Fundraising progress: {} / {} ({:.2}%)",
            progress.total_received_formatted(),
            progress.max_cap_formatted(),
            progress.percentage()
        ),
        Err(err) => {
            tracing::warn!("{}", err);
            reading.send_modify(|r| r.error = Some(err.to_string()));
        }
    }
}

struct Binding {
    client: Web3Client,
    _task: ScopedTask,
}

pub struct ProgressTracker {
    contract: Address,
    interval: Duration,
    reading: Arc<watch::Sender<ProgressReading>>,
    binding: Mutex<Option<Binding>>,
}

impl ProgressTracker {
    pub fn new(contract: Address, interval: Duration) -> Self {
        let (reading, _) = watch::channel(ProgressReading::default());
        Self {
            contract,
            interval,
            reading: Arc::new(reading),
            binding: Mutex::new(None),
        }
    }

    pub fn current(&self) -> ProgressReading {
        self.reading.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressReading> {
        self.reading.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Poll through `provider`; `None` stops polling and keeps the last values
    pub fn bind(&self, provider: Option<Web3Client>) {
        let mut binding = self.binding.lock();

        let Some(client) = provider else {
            if binding.take().is_some() {
                tracing::debug!("Fundraising progress polling stopped");
            }
            return;
        };

        if binding.as_ref().is_some_and(|b| b.client.same_provider(&client)) {
            return;
        }

        let contract = self.contract;
        let sender = Arc::clone(&self.reading);
        let poll_client = client.clone();
        let task = ScopedTask::every("progress-poll", self.interval, move || {
            let sender = Arc::clone(&sender);
            let client = poll_client.clone();
            async move { run_cycle(contract, &client, &sender).await }
        });

        *binding = Some(Binding { client, _task: task });
    }

    /// Stop polling and clear the cached values
    pub fn reset(&self) {
        self.binding.lock().take();
        self.reading.send_replace(ProgressReading::default());
    }

    /// Fetch now through the bound provider, or `provider` if given
    pub async fn refresh(&self, provider: Option<&Web3Client>) -> ProgressReading {
        let client = match provider {
            Some(client) => Some(client.clone()),
            None => self.binding.lock().as_ref().map(|b| b.client.clone()),
        };
        if let Some(client) = client {
            run_cycle(self.contract, &client, &self.reading).await;
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::MockWalletProvider;
    use crate::ports::wallet::ProviderError;
    use alloy_primitives::U256;
    use alloy_sol_types::{SolCall, SolValue};

    const ETHER: u128 = 1_000_000_000_000_000_000;

    fn distributor() -> Address {
        Address::repeat_byte(0x22)
    }

    fn mock(cap: u128, received: u128) -> Arc<MockWalletProvider> {
        Arc::new(
            MockWalletProvider::default()
                .with_call_result(ISaleDistributor::maxBnbCapCall::SELECTOR, U256::from(cap).abi_encode())
                .with_call_result(
                    ISaleDistributor::totalBnbReceivedCall::SELECTOR,
                    U256::from(received).abi_encode(),
                ),
        )
    }

    #[tokio::test]
    async fn test_refresh_reads_both_values() {
        let mock = mock(1_000 * ETHER, 250 * ETHER);
        let tracker = ProgressTracker::new(distributor(), PROGRESS_POLL_INTERVAL);

        let reading = tracker.refresh(Some(&Web3Client::new(mock))).await;

        assert_eq!(reading.progress.max_cap_formatted(), "1000.0");
        assert_eq!(reading.progress.total_received_formatted(), "250.0");
        assert_eq!(reading.progress.percentage(), 25.0);
        assert!(reading.error.is_none());
    }

    #[tokio::test]
    async fn test_second_call_failure_keeps_first_value() {
        let mock = Arc::new(
            MockWalletProvider::default()
                .with_call_result(ISaleDistributor::maxBnbCapCall::SELECTOR, U256::from(10 * ETHER).abi_encode())
                .with_call_error(
                    ISaleDistributor::totalBnbReceivedCall::SELECTOR,
                    ProviderError::from_rpc(-32000, "execution reverted"),
                ),
        );
        let tracker = ProgressTracker::new(distributor(), PROGRESS_POLL_INTERVAL);

        let reading = tracker.refresh(Some(&Web3Client::new(mock))).await;

        assert_eq!(reading.progress.max_cap, U256::from(10 * ETHER));
        assert_eq!(reading.progress.total_received, U256::ZERO);
        assert_eq!(
            reading.error.as_deref(),
            Some("Failed to fetch fundraising progress (totalBnbReceived()): execution reverted")
        );
    }

    #[tokio::test]
    async fn test_refresh_without_provider() {
        let tracker = ProgressTracker::new(distributor(), PROGRESS_POLL_INTERVAL);
        assert_eq!(tracker.refresh(None).await, ProgressReading::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_thirty_seconds() {
        let mock = mock(100 * ETHER, 0);
        let tracker = ProgressTracker::new(distributor(), PROGRESS_POLL_INTERVAL);

        tracker.bind(Some(Web3Client::new(mock.clone())));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mock.call_count("eth_call"), 2);

        mock.set_call_result(
            ISaleDistributor::totalBnbReceivedCall::SELECTOR,
            U256::from(150 * ETHER).abi_encode(),
        );
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.call_count("eth_call"), 4);
        assert!(tracker.current().progress.is_complete());
        assert_eq!(tracker.current().progress.percentage(), 100.0);

        tracker.bind(None);
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(mock.call_count("eth_call"), 4);
    }
}
