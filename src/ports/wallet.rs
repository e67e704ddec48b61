//! Wallet Provider Port
//!
//! EIP-1193 shaped interface of an injected wallet: a JSON-RPC style
//! `request` plus change notifications. Adapters classify provider failures
//! into a [`ProviderErrorKind`] so the rest of the crate never inspects
//! message text.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

/// EIP-1193 "user rejected the request"
pub const CODE_USER_REJECTED: i64 = 4001;

/// EIP-1193 "unauthorized"
pub const CODE_UNAUTHORIZED: i64 = 4100;

/// EIP-3085 "unrecognized chain id" returned by `wallet_switchEthereumChain`
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

/// Structured class of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The user declined a prompt (connect or signing)
    UserRejected,
    /// The wallet does not know the requested chain; add it first
    UnrecognizedChain,
    /// The account cannot cover value plus gas
    InsufficientFunds,
    /// Transport failure talking to the provider
    Transport,
    /// Anything else
    Other,
}

/// Error returned by a wallet provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    /// Build from a JSON-RPC error object, classifying it
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify(code, &message);
        Self {
            kind,
            code: Some(code),
            message,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transport,
            code: None,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Other,
            code: None,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::from_rpc(CODE_USER_REJECTED, "User rejected the request.")
    }

    pub fn unrecognized_chain(chain_id_hex: &str) -> Self {
        Self::from_rpc(
            CODE_UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{}\". Try adding the chain using wallet_addEthereumChain first.", chain_id_hex),
        )
    }

    pub fn insufficient_funds() -> Self {
        Self::from_rpc(-32000, "insufficient funds for gas * price + value")
    }

    pub fn is_user_rejected(&self) -> bool {
        self.kind == ProviderErrorKind::UserRejected
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.kind == ProviderErrorKind::UnrecognizedChain
    }
}

/// Node and wallet implementations report "insufficient funds" only as text
/// under the generic -32000 code, so this is the one place that reads it.
fn classify(code: i64, message: &str) -> ProviderErrorKind {
    match code {
        CODE_USER_REJECTED => ProviderErrorKind::UserRejected,
        CODE_UNRECOGNIZED_CHAIN => ProviderErrorKind::UnrecognizedChain,
        _ if message.to_ascii_lowercase().contains("insufficient funds") => {
            ProviderErrorKind::InsufficientFunds
        }
        _ => ProviderErrorKind::Other,
    }
}

/// Notification channels exposed by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderEventKind::AccountsChanged => write!(f, "accountsChanged"),
            ProviderEventKind::ChainChanged => write!(f, "chainChanged"),
        }
    }
}

/// Payload of a provider notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            ProviderEvent::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            ProviderEvent::ChainChanged(_) => ProviderEventKind::ChainChanged,
        }
    }
}

/// Handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback invoked for each notification
pub type EventListener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// Injected wallet provider
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Human-readable provider name (for logs)
    fn name(&self) -> &str;

    /// Send a JSON-RPC style request
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Register a listener, returning a handle for removal
    fn on(&self, kind: ProviderEventKind, listener: EventListener) -> ListenerId;

    /// Remove a listener; false if it was not registered
    fn remove_listener(&self, kind: ProviderEventKind, id: ListenerId) -> bool;
}

/// Listener bookkeeping shared by provider implementations
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ProviderEventKind, Vec<(ListenerId, EventListener)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: ProviderEventKind, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.lock().entry(kind).or_default().push((id, listener));
        id
    }

    pub fn remove(&self, kind: ProviderEventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(existing, _)| *existing != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Number of listeners registered for `kind`
    pub fn count(&self, kind: ProviderEventKind) -> usize {
        self.listeners.lock().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Deliver an event to every listener of its kind.
    ///
    /// Listeners are cloned out first so a callback may add or remove
    /// listeners without deadlocking.
    pub fn emit(&self, event: &ProviderEvent) {
        let targets: Vec<EventListener> = self
            .listeners
            .lock()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        tracing::debug!("Dispatching {} to {} listener(s)", event.kind(), targets.len());
        for listener in targets {
            listener(event);
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("accounts_changed", &self.count(ProviderEventKind::AccountsChanged))
            .field("chain_changed", &self.count(ProviderEventKind::ChainChanged))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_classification() {
        assert_eq!(ProviderError::from_rpc(4001, "denied").kind, ProviderErrorKind::UserRejected);
        assert_eq!(ProviderError::from_rpc(4902, "unknown").kind, ProviderErrorKind::UnrecognizedChain);
        assert_eq!(
            ProviderError::from_rpc(-32000, "Insufficient funds for gas * price + value").kind,
            ProviderErrorKind::InsufficientFunds
        );
        assert_eq!(ProviderError::from_rpc(-32603, "internal").kind, ProviderErrorKind::Other);
        assert_eq!(ProviderError::transport("down").kind, ProviderErrorKind::Transport);
    }

    #[test]
    fn test_error_display_is_message() {
        let err = ProviderError::from_rpc(-32603, "execution reverted");
        assert_eq!(err.to_string(), "execution reverted");
    }

    #[test]
    fn test_registry_add_emit_remove() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = registry.add(
            ProviderEventKind::AccountsChanged,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.emit(&ProviderEvent::AccountsChanged(vec![]));
        registry.emit(&ProviderEvent::ChainChanged(56));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(registry.remove(ProviderEventKind::AccountsChanged, id));
        assert!(!registry.remove(ProviderEventKind::AccountsChanged, id));
        assert_eq!(registry.count(ProviderEventKind::AccountsChanged), 0);

        registry.emit(&ProviderEvent::AccountsChanged(vec![]));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_ids_are_unique() {
        let registry = ListenerRegistry::new();
        let a = registry.add(ProviderEventKind::ChainChanged, Arc::new(|_| {}));
        let b = registry.add(ProviderEventKind::ChainChanged, Arc::new(|_| {}));
        assert_ne!(a, b);
        assert_eq!(registry.count(ProviderEventKind::ChainChanged), 2);
    }
}
