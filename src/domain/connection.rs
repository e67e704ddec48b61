//! Connection Status
//!
//! Wallet sources and the status half of the connection state machine.

use std::fmt;

/// Which injected wallet object a connection goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderSource {
    /// Generic `window.ethereum` (MetaMask and compatibles)
    Ethereum,
    /// `window.okxwallet`
    OkxWallet,
}

impl ProviderSource {
    pub fn wallet_name(&self) -> &'static str {
        match self {
            ProviderSource::Ethereum => "MetaMask",
            ProviderSource::OkxWallet => "OKX Wallet",
        }
    }
}

impl fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSource::Ethereum => write!(f, "ethereum"),
            ProviderSource::OkxWallet => write!(f, "okxwallet"),
        }
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Last attempt failed; carries the user-facing message
    Error(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Shorten an address for display: `0x1234...abcd`
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert_eq!(ConnectionStatus::Error("boom".into()).error(), Some("boom"));
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0x1234567890123456789012345678901234567890"),
            "0x1234...7890"
        );
        assert_eq!(short_address("0x12"), "0x12");
    }
}
