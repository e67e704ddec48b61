//! Token Descriptors
//!
//! Static descriptions of the two tokens on either side of the exchange.

use alloy_primitives::Address;

use super::network::NetworkProfile;

/// Logo shown for the native currency
pub const NATIVE_LOGO_URL: &str = "https://cryptologos.cc/logos/bnb-bnb-logo.png";

/// Logo shown for SAIGO
pub const SAIGO_LOGO_URL: &str =
    "https://images.unsplash.com/photo-1621416894569-0f39ed31d247?ixlib=rb-1.2.1&auto=format&fit=crop&w=100&q=80";

/// Immutable token description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Contract address; `None` for the chain's native currency
    pub address: Option<Address>,
    pub logo_url: String,
}

impl TokenDescriptor {
    /// Native currency descriptor derived from a network profile
    pub fn native(network: &NetworkProfile) -> Self {
        Self {
            symbol: network.native_currency.symbol.to_string(),
            name: network.native_currency.name.to_string(),
            decimals: network.native_currency.decimals,
            address: None,
            logo_url: NATIVE_LOGO_URL.to_string(),
        }
    }

    /// SAIGO token descriptor at the given contract address
    pub fn saigo(address: Address) -> Self {
        Self {
            symbol: "SAIGO".to_string(),
            name: "SAIGO Token".to_string(),
            decimals: 18,
            address: Some(address),
            logo_url: SAIGO_LOGO_URL.to_string(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::{BNB_MAINNET, BNB_TESTNET};

    #[test]
    fn test_native_follows_network() {
        let mainnet = TokenDescriptor::native(&BNB_MAINNET);
        assert_eq!(mainnet.symbol, "BNB");
        assert!(mainnet.is_native());

        let testnet = TokenDescriptor::native(&BNB_TESTNET);
        assert_eq!(testnet.symbol, "tBNB");
        assert_eq!(testnet.decimals, 18);
    }

    #[test]
    fn test_saigo_carries_address() {
        let addr = Address::repeat_byte(0x12);
        let token = TokenDescriptor::saigo(addr);
        assert_eq!(token.address, Some(addr));
        assert!(!token.is_native());
    }
}
