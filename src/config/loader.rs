//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletSection,
    pub sale: SaleSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Injected wallet endpoints and the environment they appear in
#[derive(Debug, Clone, Deserialize)]
pub struct WalletSection {
    /// JSON-RPC endpoint standing in for `window.ethereum`
    #[serde(default)]
    pub ethereum_url: Option<String>,
    /// JSON-RPC endpoint standing in for `window.okxwallet`
    #[serde(default)]
    pub okx_url: Option<String>,
    /// User agent used for mobile / in-app detection
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Public URL of the exchange page (used in OKX deep links)
    #[serde(default = "default_dapp_url")]
    pub dapp_url: String,
}

fn default_user_agent() -> String {
    format!("saigo-exchange/{}", env!("CARGO_PKG_VERSION"))
}

fn default_dapp_url() -> String {
    "https://home.saigo.dev/".to_string()
}

impl Default for WalletSection {
    fn default() -> Self {
        Self {
            ethereum_url: None,
            okx_url: None,
            user_agent: default_user_agent(),
            dapp_url: default_dapp_url(),
        }
    }
}

impl WalletSection {
    /// Ethereum provider URL with environment variable override
    /// Checks SAIGO_ETHEREUM_URL env var first, falls back to config value
    pub fn get_ethereum_url(&self) -> Option<String> {
        non_empty(std::env::var("SAIGO_ETHEREUM_URL").ok()).or_else(|| non_empty(self.ethereum_url.clone()))
    }

    /// OKX provider URL with environment variable override
    /// Checks SAIGO_OKX_URL env var first, falls back to config value
    pub fn get_okx_url(&self) -> Option<String> {
        non_empty(std::env::var("SAIGO_OKX_URL").ok()).or_else(|| non_empty(self.okx_url.clone()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Sale contract configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SaleSection {
    /// Distributor receiving value transfers and exposing sale parameters
    pub contract_address: Address,
    /// SAIGO ERC-20 contract
    pub token_address: Address,
    /// Gas limit ceiling for the transfer
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Rate shown before the contract rate has loaded
    #[serde(default = "default_fallback_rate")]
    pub fallback_exchange_rate: String,
}

fn default_gas_limit() -> u64 {
    200_000
}

fn default_fallback_rate() -> String {
    "14285.7".to_string()
}

impl SaleSection {
    pub fn fallback_rate(&self) -> Decimal {
        Decimal::from_str(&self.fallback_exchange_rate).unwrap_or_default()
    }
}

/// Refresh cadence section
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_balance_interval")]
    pub balance_interval_secs: u64,
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
    /// How often HTTP providers are polled for account / chain changes
    #[serde(default = "default_event_interval")]
    pub event_interval_secs: u64,
    /// Receipt polling while waiting for confirmation
    #[serde(default = "default_receipt_interval")]
    pub receipt_interval_ms: u64,
}

fn default_balance_interval() -> u64 {
    15
}

fn default_progress_interval() -> u64 {
    30
}

fn default_event_interval() -> u64 {
    2
}

fn default_receipt_interval() -> u64 {
    1_000
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            balance_interval_secs: default_balance_interval(),
            progress_interval_secs: default_progress_interval(),
            event_interval_secs: default_event_interval(),
            receipt_interval_ms: default_receipt_interval(),
        }
    }
}

impl PollingSection {
    pub fn balance_interval(&self) -> Duration {
        Duration::from_secs(self.balance_interval_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn event_interval(&self) -> Duration {
        Duration::from_secs(self.event_interval_secs)
    }

    pub fn receipt_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_interval_ms)
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string();
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sale.contract_address == Address::ZERO {
            return Err(ConfigError::ValidationError(
                "sale.contract_address cannot be the zero address".to_string(),
            ));
        }

        if self.sale.token_address == Address::ZERO {
            return Err(ConfigError::ValidationError(
                "sale.token_address cannot be the zero address".to_string(),
            ));
        }

        if self.sale.gas_limit == 0 {
            return Err(ConfigError::ValidationError(
                "sale.gas_limit must be > 0".to_string(),
            ));
        }

        match Decimal::from_str(&self.sale.fallback_exchange_rate) {
            Ok(rate) if rate > Decimal::ZERO => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "sale.fallback_exchange_rate must be a positive decimal, got {}",
                    self.sale.fallback_exchange_rate
                )))
            }
        }

        for (name, value) in [
            ("balance_interval_secs", self.polling.balance_interval_secs),
            ("progress_interval_secs", self.polling.progress_interval_secs),
            ("event_interval_secs", self.polling.event_interval_secs),
            ("receipt_interval_ms", self.polling.receipt_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "polling.{} must be > 0",
                    name
                )));
            }
        }

        for url in [&self.wallet.ethereum_url, &self.wallet.okx_url].into_iter().flatten() {
            if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "wallet provider URL must be http(s), got {}",
                    url
                )));
            }
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of trace/debug/info/warn/error, got {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}
