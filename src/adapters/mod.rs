//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Contracts: Solidity interfaces of the sale distributor and token
//! - Web3: typed JSON-RPC calls over a wallet provider
//! - HTTP Provider: wallet provider backed by a JSON-RPC endpoint
//! - Environment: injected providers and user agent detection
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod contracts;
pub mod environment;
pub mod http_provider;
pub mod web3;

pub use cli::CliApp;
pub use environment::Environment;
pub use http_provider::HttpWalletProvider;
pub use web3::{Signer, TransactionReceipt, TransactionRequest, Web3Client};
