//! Balance Fetcher
//!
//! Reads a token balance (native or ERC-20) for an address and keeps it
//! fresh on a timer while an address and provider are bound.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::fetch::FetchError;
use crate::adapters::web3::Web3Client;
use crate::domain::token::TokenDescriptor;
use crate::domain::units::format_units;
use crate::task::ScopedTask;

/// Default refresh period
pub const BALANCE_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Latest balance and the error of the fetch that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReading {
    /// Decimal string scaled by the token's decimals
    pub balance: String,
    pub error: Option<String>,
}

impl Default for BalanceReading {
    fn default() -> Self {
        Self {
            balance: "0".to_string(),
            error: None,
        }
    }
}

/// Fetch one balance. Never fails: errors come back as `"0"` plus a message.
pub async fn fetch_balance(
    token: &TokenDescriptor,
    address: Option<Address>,
    provider: Option<&Web3Client>,
) -> BalanceReading {
    let (Some(address), Some(client)) = (address, provider) else {
        return BalanceReading::default();
    };

    let raw = match token.address {
        Some(contract) => client.token_balance(contract, address).await,
        None => client.get_balance(address).await,
    };

    match raw {
        Ok(value) => BalanceReading {
            balance: format_units(value, token.decimals),
            error: None,
        },
        Err(source) => {
            let err = FetchError::Balance {
                symbol: token.symbol.clone(),
                source,
            };
            tracing::warn!("{}", err);
            BalanceReading {
                balance: "0".to_string(),
                error: Some(err.to_string()),
            }
        }
    }
}

struct Binding {
    address: Address,
    client: Web3Client,
    _task: ScopedTask,
}

/// Polls one token's balance for the bound address
pub struct BalanceTracker {
    token: TokenDescriptor,
    interval: Duration,
    reading: Arc<watch::Sender<BalanceReading>>,
    binding: Mutex<Option<Binding>>,
    /// Bumped under the binding lock whenever the binding changes
    generation: AtomicU64,
}

impl BalanceTracker {
    pub fn new(token: TokenDescriptor, interval: Duration) -> Self {
        let (reading, _) = watch::channel(BalanceReading::default());
        Self {
            token,
            interval,
            reading: Arc::new(reading),
            binding: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn token(&self) -> &TokenDescriptor {
        &self.token
    }

    pub fn current(&self) -> BalanceReading {
        self.reading.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BalanceReading> {
        self.reading.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Point the tracker at an address and provider.
    ///
    /// A changed address or provider fetches immediately and restarts the
    /// timer; the same pair is a no-op; a missing one stops polling.
    pub fn bind(&self, address: Option<Address>, provider: Option<Web3Client>) {
        let mut binding = self.binding.lock();

        let (Some(address), Some(client)) = (address, provider) else {
            if binding.take().is_some() {
                tracing::debug!("{} balance polling stopped", self.token.symbol);
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.reading.send_replace(BalanceReading::default());
            return;
        };

        if let Some(current) = binding.as_ref() {
            if current.address == address && current.client.same_provider(&client) {
                return;
            }
        }

        let token = self.token.clone();
        let sender = Arc::clone(&self.reading);
        let poll_client = client.clone();
        let task = ScopedTask::every("balance-poll", self.interval, move || {
            let token = token.clone();
            let sender = Arc::clone(&sender);
            let client = poll_client.clone();
            async move {
                let reading = fetch_balance(&token, Some(address), Some(&client)).await;
                sender.send_replace(reading);
            }
        });

        tracing::debug!(
            "{} balance polling for {} every {:?}",
            self.token.symbol,
            address,
            self.interval
        );
        self.generation.fetch_add(1, Ordering::SeqCst);
        *binding = Some(Binding {
            address,
            client,
            _task: task,
        });
    }

    /// Fetch now with the current binding. A result for a binding that
    /// changed while the fetch was in flight is dropped.
    pub async fn refresh(&self) -> BalanceReading {
        let target = {
            let binding = self.binding.lock();
            binding
                .as_ref()
                .map(|b| (self.generation.load(Ordering::SeqCst), b.address, b.client.clone()))
        };

        let Some((generation, address, client)) = target else {
            return self.current();
        };
        let reading = fetch_balance(&self.token, Some(address), Some(&client)).await;

        let _binding = self.binding.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding stale {} balance for {}", self.token.symbol, address);
            return self.current();
        }
        self.reading.send_replace(reading.clone());
        reading
    }

    /// Fetch once for `address` without starting the poller. A bound
    /// tracker refreshes its own binding instead.
    pub async fn load(&self, address: Option<Address>, provider: Option<&Web3Client>) -> BalanceReading {
        if self.is_polling() {
            return self.refresh().await;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let reading = fetch_balance(&self.token, address, provider).await;

        let _binding = self.binding.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return self.current();
        }
        self.reading.send_replace(reading.clone());
        reading
    }
}
