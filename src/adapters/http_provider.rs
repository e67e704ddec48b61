//! HTTP Wallet Provider
//!
//! Plays the role of an injected wallet by speaking JSON-RPC 2.0 over HTTP,
//! e.g. to a wallet bridge or a development node with unlocked accounts.
//! Change notifications are synthesized by polling `eth_accounts` and
//! `eth_chainId`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::web3::parse_u64;
use crate::ports::wallet::{
    EventListener, ListenerId, ListenerRegistry, ProviderError, ProviderEvent, ProviderEventKind,
    WalletProvider,
};
use crate::task::ScopedTask;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Last values seen by [`HttpWalletProvider::poll_events`]
#[derive(Debug, Default)]
struct Observed {
    accounts: Option<Vec<Address>>,
    chain_id: Option<u64>,
}

impl Observed {
    /// Store the latest poll and return what changed since the previous one.
    /// Nothing is reported until a baseline exists.
    fn update(&mut self, accounts: Vec<Address>, chain_id: u64) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        if let Some(previous) = &self.accounts {
            if *previous != accounts {
                events.push(ProviderEvent::AccountsChanged(accounts.clone()));
            }
        }
        if let Some(previous) = self.chain_id {
            if previous != chain_id {
                events.push(ProviderEvent::ChainChanged(chain_id));
            }
        }
        self.accounts = Some(accounts);
        self.chain_id = Some(chain_id);
        events
    }
}

/// JSON-RPC provider reachable over HTTP
#[derive(Debug)]
pub struct HttpWalletProvider {
    name: String,
    url: String,
    http: Client,
    next_id: AtomicU64,
    listeners: ListenerRegistry,
    observed: Mutex<Observed>,
}

impl HttpWalletProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ProviderError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
            listeners: ListenerRegistry::new(),
            observed: Mutex::new(Observed::default()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Compare current accounts and chain with the last poll and notify
    /// listeners of differences. The first poll only records a baseline.
    pub async fn poll_events(&self) -> Result<(), ProviderError> {
        let accounts_value = self.request("eth_accounts", json!([])).await?;
        let accounts: Vec<Address> = accounts_value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().and_then(|s| s.parse().ok()))
                    .collect()
            })
            .unwrap_or_default();
        let chain_id = parse_u64(&self.request("eth_chainId", json!([])).await?)?;

        self.record(accounts, chain_id);
        Ok(())
    }

    /// Fold one poll result into the observed state and notify listeners
    fn record(&self, accounts: Vec<Address>, chain_id: u64) -> Vec<ProviderEvent> {
        let events = self.observed.lock().update(accounts, chain_id);
        for event in &events {
            tracing::info!("{}: {:?}", self.name, event);
            self.listeners.emit(event);
        }
        events
    }

    /// Poll for account and chain changes until the handle is dropped
    pub fn spawn_event_watcher(self: &Arc<Self>, interval: Duration) -> ScopedTask {
        let provider = Arc::clone(self);
        ScopedTask::every("provider-events", interval, move || {
            let provider = Arc::clone(&provider);
            async move {
                if let Err(e) = provider.poll_events().await {
                    tracing::warn!("{}: event poll failed: {}", provider.name, e);
                }
            }
        })
    }
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::trace!("{} -> {} (id {})", self.name, method, id);

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::transport(format!("HTTP {}: {}", status, text)));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc.error {
            tracing::debug!("{} <- {} error {}: {}", self.name, method, error.code, error.message);
            return Err(ProviderError::from_rpc(error.code, error.message));
        }

        Ok(rpc.result.unwrap_or(Value::Null))
    }

    fn on(&self, kind: ProviderEventKind, listener: EventListener) -> ListenerId {
        self.listeners.add(kind, listener)
    }

    fn remove_listener(&self, kind: ProviderEventKind, id: ListenerId) -> bool {
        self.listeners.remove(kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = HttpWalletProvider::new("ethereum", "http://127.0.0.1:8545").unwrap();
        assert_eq!(provider.name(), "ethereum");
        assert_eq!(provider.url(), "http://127.0.0.1:8545");
    }

    #[test]
    fn test_rpc_request_shape() {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 3,
            method: "eth_chainId",
            params: json!([]),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 3, "method": "eth_chainId", "params": []}));
    }

    #[test]
    fn test_rpc_error_response_parses() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":4902,"message":"Unrecognized chain"}}"#;
        let parsed: RpcResponse = serde_json::from_str(raw).unwrap();
        let error = parsed.error.unwrap();
        let mapped = ProviderError::from_rpc(error.code, error.message);
        assert!(mapped.is_unrecognized_chain());
        assert!(parsed.result.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let provider = HttpWalletProvider::new("ethereum", "http://127.0.0.1:1").unwrap();
        let err = provider.request("eth_chainId", json!([])).await.unwrap_err();
        assert_eq!(err.kind, crate::ports::wallet::ProviderErrorKind::Transport);
    }

    fn account(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_first_poll_is_baseline() {
        let mut observed = Observed::default();
        assert!(observed.update(vec![account(1)], 97).is_empty());
        assert_eq!(observed.accounts, Some(vec![account(1)]));
        assert_eq!(observed.chain_id, Some(97));
    }

    #[test]
    fn test_unchanged_poll_reports_nothing() {
        let mut observed = Observed::default();
        observed.update(vec![account(1)], 97);
        assert!(observed.update(vec![account(1)], 97).is_empty());
    }

    #[test]
    fn test_disconnect_reports_empty_accounts() {
        let mut observed = Observed::default();
        observed.update(vec![account(1)], 97);
        assert_eq!(observed.update(vec![], 97), vec![ProviderEvent::AccountsChanged(vec![])]);
    }

    #[test]
    fn test_chain_switch_reports_new_chain() {
        let mut observed = Observed::default();
        observed.update(vec![account(1)], 97);
        assert_eq!(observed.update(vec![account(1)], 56), vec![ProviderEvent::ChainChanged(56)]);
    }

    #[test]
    fn test_account_and_chain_change_together() {
        let mut observed = Observed::default();
        observed.update(vec![account(1)], 97);
        assert_eq!(
            observed.update(vec![account(2)], 56),
            vec![ProviderEvent::AccountsChanged(vec![account(2)]), ProviderEvent::ChainChanged(56)]
        );
    }

    #[test]
    fn test_recorded_changes_reach_listeners() {
        let provider = HttpWalletProvider::new("ethereum", "http://127.0.0.1:8545").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        provider.on(
            ProviderEventKind::ChainChanged,
            Arc::new(move |event: &ProviderEvent| sink.lock().push(event.clone())),
        );

        provider.record(vec![account(1)], 97);
        provider.record(vec![], 56);

        assert_eq!(*seen.lock(), vec![ProviderEvent::ChainChanged(56)]);
    }
}
