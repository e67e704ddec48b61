//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - The injected wallet provider (EIP-1193 requests and notifications)
//! - The wall clock used for sale-window checks

pub mod clock;
pub mod mocks;
pub mod wallet;

pub use clock::{Clock, SystemClock};
pub use wallet::{
    EventListener, ListenerId, ListenerRegistry, ProviderError, ProviderErrorKind, ProviderEvent,
    ProviderEventKind, WalletProvider, CODE_UNRECOGNIZED_CHAIN, CODE_USER_REJECTED,
};
