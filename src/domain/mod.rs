//! Domain Layer - Core types and rules for the SAIGO exchange client
//!
//! Pure types with no I/O. All provider interaction happens through the
//! ports layer.

pub mod connection;
pub mod exchange;
pub mod network;
pub mod sale;
pub mod token;
pub mod units;

pub use connection::{short_address, ConnectionStatus, ProviderSource};
pub use exchange::{validate_swap, SwapRequest, ValidationError};
pub use network::{current_network_currency, NetworkProfile, BNB_CHAIN_ID, BNB_TESTNET_CHAIN_ID, CURRENT_NETWORK_ID};
pub use sale::{FundraisingProgress, SaleParameters, WindowStatus};
pub use token::TokenDescriptor;
pub use units::{format_ether, format_units, parse_ether, parse_units, AmountError};
