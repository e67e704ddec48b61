//! SAIGO Exchange - token sale client library
//!
//! Connects to an EIP-1193 wallet provider, reads the sale distributor and
//! sends native currency to it in exchange for SAIGO.
//!
//! # Modules
//!
//! - `domain`: Core types (network profiles, units, sale parameters, validation)
//! - `ports`: Trait abstractions (WalletProvider, Clock)
//! - `adapters`: External implementations (contracts, JSON-RPC provider, CLI)
//! - `application`: Connection manager, fetchers and exchange submitter
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod task;
