//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    Config, ConfigError, LoggingSection, PollingSection, SaleSection, WalletSection, load_config,
    parse_config,
};
