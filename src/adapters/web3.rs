//! Web3 Client
//!
//! Typed wrapper over a [`WalletProvider`]: account and chain requests,
//! balance and contract reads, and a signer for value transfers.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{hex, Address, B256, U256};
use alloy_sol_types::SolCall;
use serde_json::{json, Value};

use super::contracts::IERC20;
use crate::domain::network::NetworkProfile;
use crate::ports::wallet::{ProviderError, WalletProvider};

/// Provider handle shared by everything reading chain state
#[derive(Clone)]
pub struct Web3Client {
    provider: Arc<dyn WalletProvider>,
}

impl std::fmt::Debug for Web3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Web3Client")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Web3Client {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }

    /// Whether both handles wrap the same provider object
    pub fn same_provider(&self, other: &Web3Client) -> bool {
        Arc::as_ptr(&self.provider) as *const () == Arc::as_ptr(&other.provider) as *const ()
    }

    /// Accounts already authorized, without prompting
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let value = self.provider.request("eth_accounts", json!([])).await?;
        parse_accounts(&value)
    }

    /// Prompt the user for account access
    pub async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let value = self.provider.request("eth_requestAccounts", json!([])).await?;
        parse_accounts(&value)
    }

    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let value = self.provider.request("eth_chainId", json!([])).await?;
        parse_u64(&value)
    }

    pub async fn switch_chain(&self, network: &NetworkProfile) -> Result<(), ProviderError> {
        self.provider
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": network.chain_id_hex }]),
            )
            .await
            .map(|_| ())
    }

    pub async fn add_chain(&self, network: &NetworkProfile) -> Result<(), ProviderError> {
        let params = serde_json::to_value(network)
            .map_err(|e| ProviderError::other(format!("Failed to encode network: {}", e)))?;
        self.provider
            .request("wallet_addEthereumChain", json!([params]))
            .await
            .map(|_| ())
    }

    /// Native balance in wei
    pub async fn get_balance(&self, account: Address) -> Result<U256, ProviderError> {
        let value = self
            .provider
            .request("eth_getBalance", json!([account.to_string(), "latest"]))
            .await?;
        parse_quantity(&value)
    }

    /// ERC-20 `balanceOf`
    pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ProviderError> {
        let ret = self.call(token, IERC20::balanceOfCall { owner }).await?;
        Ok(ret._0)
    }

    /// Read-only contract call, decoded
    pub async fn call<C: SolCall + Send>(&self, to: Address, call: C) -> Result<C::Return, ProviderError> {
        let data = hex::encode_prefixed(call.abi_encode());
        let value = self
            .provider
            .request("eth_call", json!([{ "to": to.to_string(), "data": data }, "latest"]))
            .await?;

        let raw = value
            .as_str()
            .ok_or_else(|| ProviderError::other(format!("{} returned a non-string result", C::SIGNATURE)))?;
        let bytes = hex::decode(raw)
            .map_err(|e| ProviderError::other(format!("{} returned invalid hex: {}", C::SIGNATURE, e)))?;

        C::abi_decode_returns(&bytes, true)
            .map_err(|e| ProviderError::other(format!("Failed to decode {}: {}", C::SIGNATURE, e)))
    }

    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, ProviderError> {
        let value = self
            .provider
            .request("eth_getTransactionReceipt", json!([hex::encode_prefixed(hash)]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        TransactionReceipt::from_json(&value).map(Some)
    }
}

/// Native value transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
}

impl TransactionRequest {
    fn to_json(&self) -> Value {
        json!({
            "from": self.from.to_string(),
            "to": self.to.to_string(),
            "value": format!("0x{:x}", self.value),
            "gas": format!("0x{:x}", self.gas_limit),
        })
    }
}

/// Mined transaction outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    /// true when the transaction succeeded
    pub status: bool,
    pub block_number: Option<u64>,
}

impl TransactionReceipt {
    fn from_json(value: &Value) -> Result<Self, ProviderError> {
        let transaction_hash = value["transactionHash"]
            .as_str()
            .and_then(|h| h.parse::<B256>().ok())
            .ok_or_else(|| ProviderError::other("Receipt is missing transactionHash"))?;
        let status = parse_u64(&value["status"])? == 1;
        let block_number = value.get("blockNumber").and_then(|b| parse_u64(b).ok());

        Ok(Self {
            transaction_hash,
            status,
            block_number,
        })
    }
}

/// Signing handle; the wallet signs with its selected account
#[derive(Debug, Clone)]
pub struct Signer {
    client: Web3Client,
}

impl Signer {
    pub fn new(client: Web3Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Web3Client {
        &self.client
    }

    /// Submit a transaction, returning its hash
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError> {
        let value = self
            .client
            .provider
            .request("eth_sendTransaction", json!([tx.to_json()]))
            .await?;
        value
            .as_str()
            .and_then(|h| h.parse::<B256>().ok())
            .ok_or_else(|| ProviderError::other("eth_sendTransaction did not return a hash"))
    }

    /// Poll until the transaction is mined. There is no deadline.
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, ProviderError> {
        loop {
            if let Some(receipt) = self.client.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            tracing::debug!("Transaction {} pending, polling again in {:?}", hash, poll_interval);
            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn parse_accounts(value: &Value) -> Result<Vec<Address>, ProviderError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProviderError::other("Account list must be an array"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| ProviderError::other(format!("Invalid account in list: {}", item)))
        })
        .collect()
}

/// Parse a hex quantity ("0x1a") or a decimal number
pub(crate) fn parse_quantity(value: &Value) -> Result<U256, ProviderError> {
    match value {
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex_digits) if hex_digits.is_empty() => Ok(U256::ZERO),
                Some(hex_digits) => U256::from_str_radix(hex_digits, 16),
                None => U256::from_str_radix(s, 10),
            };
            parsed.map_err(|e| ProviderError::other(format!("Invalid quantity {}: {}", s, e)))
        }
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| ProviderError::other(format!("Invalid quantity {}", n))),
        other => Err(ProviderError::other(format!("Invalid quantity {}", other))),
    }
}

pub(crate) fn parse_u64(value: &Value) -> Result<u64, ProviderError> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity).map_err(|_| ProviderError::other(format!("Quantity {} exceeds u64", quantity)))
}
