//! Network Profiles
//!
//! Static BNB Smart Chain network descriptions. The current network is fixed
//! at build time: the `mainnet` feature selects chain 56, otherwise the
//! testnet (chain 97) is used.

use serde::Serialize;

/// BNB Smart Chain mainnet chain id
pub const BNB_CHAIN_ID: u64 = 56;

/// BNB Smart Chain testnet chain id
pub const BNB_TESTNET_CHAIN_ID: u64 = 97;

/// Chain id the client targets
#[cfg(feature = "mainnet")]
pub const CURRENT_NETWORK_ID: u64 = BNB_CHAIN_ID;

/// Chain id the client targets
#[cfg(not(feature = "mainnet"))]
pub const CURRENT_NETWORK_ID: u64 = BNB_TESTNET_CHAIN_ID;

/// Native currency of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// Static description of a chain, shaped after the
/// `wallet_addEthereumChain` parameter object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(skip)]
    pub chain_id: u64,
    #[serde(rename = "chainId")]
    pub chain_id_hex: &'static str,
    pub chain_name: &'static str,
    pub native_currency: NativeCurrency,
    pub rpc_urls: &'static [&'static str],
    pub block_explorer_urls: &'static [&'static str],
}

pub static BNB_MAINNET: NetworkProfile = NetworkProfile {
    chain_id: BNB_CHAIN_ID,
    chain_id_hex: "0x38",
    chain_name: "BNB Smart Chain Mainnet",
    native_currency: NativeCurrency {
        name: "BNB",
        symbol: "BNB",
        decimals: 18,
    },
    rpc_urls: &["https://bsc-dataseed.binance.org/"],
    block_explorer_urls: &["https://bscscan.com/"],
};

pub static BNB_TESTNET: NetworkProfile = NetworkProfile {
    chain_id: BNB_TESTNET_CHAIN_ID,
    chain_id_hex: "0x61",
    chain_name: "BNB Smart Chain Testnet",
    native_currency: NativeCurrency {
        name: "tBNB",
        symbol: "tBNB",
        decimals: 18,
    },
    rpc_urls: &["https://data-seed-prebsc-1-s1.binance.org:8545/"],
    block_explorer_urls: &["https://testnet.bscscan.com/"],
};

impl NetworkProfile {
    /// Look up a known profile by chain id
    pub fn by_chain_id(chain_id: u64) -> Option<&'static NetworkProfile> {
        match chain_id {
            BNB_CHAIN_ID => Some(&BNB_MAINNET),
            BNB_TESTNET_CHAIN_ID => Some(&BNB_TESTNET),
            _ => None,
        }
    }

    /// Profile selected at build time
    pub fn current() -> &'static NetworkProfile {
        if CURRENT_NETWORK_ID == BNB_CHAIN_ID {
            &BNB_MAINNET
        } else {
            &BNB_TESTNET
        }
    }

    /// Whether this is a test network
    pub fn is_testnet(&self) -> bool {
        self.chain_id != BNB_CHAIN_ID
    }

    /// Short label shown next to the wallet button ("" on mainnet)
    pub fn short_name(&self) -> &'static str {
        if self.is_testnet() {
            "Testnet"
        } else {
            ""
        }
    }

    /// Explorer link for a transaction hash
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.block_explorer_urls
            .first()
            .map(|base| format!("{}tx/{}", base, tx_hash))
    }
}

/// Symbol of the current network's native currency
pub fn current_network_currency() -> &'static str {
    NetworkProfile::current().native_currency.symbol
}
