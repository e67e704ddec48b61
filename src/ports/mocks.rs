//! Mock Wallet Provider
//!
//! Scriptable in-memory provider used by tests and by `--dry-run` style
//! demos. Records every request and answers from configured state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{hex, Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::clock::Clock;
use super::wallet::{
    EventListener, ListenerId, ListenerRegistry, ProviderError, ProviderEvent, ProviderEventKind,
    WalletProvider,
};
use crate::domain::network::{BNB_CHAIN_ID, BNB_TESTNET_CHAIN_ID, CURRENT_NETWORK_ID};

#[derive(Debug)]
struct MockState {
    /// Returned by `eth_accounts`
    authorized: Vec<Address>,
    /// Returned by `eth_requestAccounts`; granting also authorizes
    grantable: Vec<Address>,
    chain_id: u64,
    known_chains: HashSet<u64>,
    balances: HashMap<Address, U256>,
    /// `eth_call` answers keyed by 4-byte selector
    call_results: HashMap<[u8; 4], Result<Vec<u8>, ProviderError>>,
    /// Methods that always fail
    failures: HashMap<String, ProviderError>,
    receipt_status: u64,
    sent_transactions: Vec<Value>,
    calls: Vec<String>,
    tx_counter: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            authorized: Vec::new(),
            grantable: Vec::new(),
            chain_id: CURRENT_NETWORK_ID,
            known_chains: [BNB_CHAIN_ID, BNB_TESTNET_CHAIN_ID].into_iter().collect(),
            balances: HashMap::new(),
            call_results: HashMap::new(),
            failures: HashMap::new(),
            receipt_status: 1,
            sent_transactions: Vec::new(),
            calls: Vec::new(),
            tx_counter: 0,
        }
    }
}

/// In-memory wallet provider
#[derive(Debug)]
pub struct MockWalletProvider {
    name: String,
    state: Mutex<MockState>,
    listeners: ListenerRegistry,
}

impl Default for MockWalletProvider {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockWalletProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(MockState::default()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Accounts granted on `eth_requestAccounts`
    pub fn with_accounts(self, accounts: Vec<Address>) -> Self {
        self.state.lock().grantable = accounts;
        self
    }

    /// Accounts already authorized (returned by `eth_accounts`)
    pub fn with_authorized(self, accounts: Vec<Address>) -> Self {
        {
            let mut state = self.state.lock();
            state.authorized = accounts.clone();
            state.grantable = accounts;
        }
        self
    }

    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.state.lock().chain_id = chain_id;
        self
    }

    /// Make the wallet answer 4902 when asked to switch to `chain_id`
    pub fn with_unknown_chain(self, chain_id: u64) -> Self {
        self.state.lock().known_chains.remove(&chain_id);
        self
    }

    pub fn with_balance(self, account: Address, wei: U256) -> Self {
        self.state.lock().balances.insert(account, wei);
        self
    }

    /// Answer `eth_call` for `selector` with ABI-encoded `output`
    pub fn with_call_result(self, selector: [u8; 4], output: Vec<u8>) -> Self {
        self.set_call_result(selector, output);
        self
    }

    pub fn with_call_error(self, selector: [u8; 4], error: ProviderError) -> Self {
        self.state.lock().call_results.insert(selector, Err(error));
        self
    }

    pub fn with_failure(self, method: &str, error: ProviderError) -> Self {
        self.set_failure(method, error);
        self
    }

    pub fn with_receipt_status(self, status: u64) -> Self {
        self.state.lock().receipt_status = status;
        self
    }

    pub fn set_call_result(&self, selector: [u8; 4], output: Vec<u8>) {
        self.state.lock().call_results.insert(selector, Ok(output));
    }

    pub fn set_balance(&self, account: Address, wei: U256) {
        self.state.lock().balances.insert(account, wei);
    }

    pub fn set_failure(&self, method: &str, error: ProviderError) {
        self.state.lock().failures.insert(method.to_string(), error);
    }

    pub fn clear_failure(&self, method: &str) {
        self.state.lock().failures.remove(method);
    }

    /// Every method requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state.lock().calls.iter().filter(|m| m.as_str() == method).count()
    }

    /// Transaction objects passed to `eth_sendTransaction`
    pub fn sent_transactions(&self) -> Vec<Value> {
        self.state.lock().sent_transactions.clone()
    }

    pub fn chain_id(&self) -> u64 {
        self.state.lock().chain_id
    }

    pub fn listener_count(&self, kind: ProviderEventKind) -> usize {
        self.listeners.count(kind)
    }

    /// Change accounts and notify listeners
    pub fn emit_accounts_changed(&self, accounts: Vec<Address>) {
        {
            let mut state = self.state.lock();
            state.authorized = accounts.clone();
        }
        self.listeners.emit(&ProviderEvent::AccountsChanged(accounts));
    }

    /// Change chain and notify listeners
    pub fn emit_chain_changed(&self, chain_id: u64) {
        self.state.lock().chain_id = chain_id;
        self.listeners.emit(&ProviderEvent::ChainChanged(chain_id));
    }

    fn answer(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let mut state = self.state.lock();
        state.calls.push(method.to_string());

        if let Some(err) = state.failures.get(method) {
            return Err(err.clone());
        }

        match method {
            "eth_accounts" => Ok(json!(state.authorized.iter().map(|a| a.to_string()).collect::<Vec<_>>())),
            "eth_requestAccounts" => {
                state.authorized = state.grantable.clone();
                Ok(json!(state.grantable.iter().map(|a| a.to_string()).collect::<Vec<_>>()))
            }
            "eth_chainId" => Ok(json!(format!("{:#x}", state.chain_id))),
            "wallet_switchEthereumChain" => {
                let requested = params[0]["chainId"]
                    .as_str()
                    .and_then(|h| u64::from_str_radix(h.trim_start_matches("0x"), 16).ok())
                    .ok_or_else(|| ProviderError::from_rpc(-32602, "invalid chainId"))?;
                if !state.known_chains.contains(&requested) {
                    return Err(ProviderError::unrecognized_chain(&format!("{:#x}", requested)));
                }
                state.chain_id = requested;
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let added = params[0]["chainId"]
                    .as_str()
                    .and_then(|h| u64::from_str_radix(h.trim_start_matches("0x"), 16).ok())
                    .ok_or_else(|| ProviderError::from_rpc(-32602, "invalid chainId"))?;
                state.known_chains.insert(added);
                state.chain_id = added;
                Ok(Value::Null)
            }
            "eth_getBalance" => {
                let account: Address = params[0]
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| ProviderError::from_rpc(-32602, "invalid address"))?;
                let balance = state.balances.get(&account).copied().unwrap_or(U256::ZERO);
                Ok(json!(format!("0x{:x}", balance)))
            }
            "eth_call" => {
                let data = params[0]["data"]
                    .as_str()
                    .and_then(|d| hex::decode(d).ok())
                    .ok_or_else(|| ProviderError::from_rpc(-32602, "invalid call data"))?;
                if data.len() < 4 {
                    return Err(ProviderError::from_rpc(-32602, "call data too short"));
                }
                let selector = [data[0], data[1], data[2], data[3]];
                match state.call_results.get(&selector) {
                    Some(Ok(output)) => Ok(json!(hex::encode_prefixed(output))),
                    Some(Err(err)) => Err(err.clone()),
                    None => Err(ProviderError::from_rpc(-32000, "execution reverted")),
                }
            }
            "eth_sendTransaction" => {
                state.tx_counter += 1;
                state.sent_transactions.push(params[0].clone());
                let hash = B256::left_padding_from(&state.tx_counter.to_be_bytes());
                Ok(json!(hex::encode_prefixed(hash)))
            }
            "eth_getTransactionReceipt" => Ok(json!({
                "transactionHash": params[0].clone(),
                "status": format!("{:#x}", state.receipt_status),
                "blockNumber": "0x1",
            })),
            other => Err(ProviderError::from_rpc(-32601, format!("method {} not supported", other))),
        }
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.answer(method, &params)
    }

    fn on(&self, kind: ProviderEventKind, listener: EventListener) -> ListenerId {
        self.listeners.add(kind, listener)
    }

    fn remove_listener(&self, kind: ProviderEventKind, id: ListenerId) -> bool {
        self.listeners.remove(kind, id)
    }
}

/// Clock frozen at a settable instant
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(now: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(now)))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
