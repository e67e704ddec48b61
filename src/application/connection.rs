//! Connection Manager
//!
//! Owns the wallet connection state machine:
//! `Disconnected -> Connecting -> Connected | Error`, driven by explicit
//! connect / disconnect calls and by provider notifications.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use alloy_primitives::Address;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

use super::in_flight::InFlight;
use crate::adapters::environment::{Environment, OKX_DOWNLOAD_URL};
use crate::adapters::web3::{Signer, Web3Client};
use crate::domain::connection::{ConnectionStatus, ProviderSource};
use crate::domain::network::NetworkProfile;
use crate::ports::wallet::{
    EventListener, ListenerId, ProviderError, ProviderEvent, ProviderEventKind, WalletProvider,
};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("MetaMask is not installed. Please install MetaMask to continue.")]
    MetaMaskNotInstalled,
    #[error("No wallet detected. Please install MetaMask or OKX Wallet.")]
    NoWalletDetected,
    #[error("OKX Wallet is not installed. Please install OKX Wallet to continue.")]
    OkxNotInstalled,
    #[error("No accounts found. Please connect to {}.", .0.wallet_name())]
    NoAccounts(ProviderSource),
    #[error("{0}")]
    Rejected(ProviderError),
    #[error("{0}")]
    Provider(ProviderError),
    #[error("A connection request is already in progress")]
    InProgress,
}

impl From<ProviderError> for ConnectError {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejected() {
            ConnectError::Rejected(err)
        } else {
            ConnectError::Provider(err)
        }
    }
}

/// Current wallet connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub source: Option<ProviderSource>,
    pub provider: Option<Web3Client>,
    pub signer: Option<Signer>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    fn connected(
        address: Address,
        chain_id: Option<u64>,
        source: ProviderSource,
        client: Web3Client,
    ) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            address: Some(address),
            chain_id,
            source: Some(source),
            signer: Some(Signer::new(client.clone())),
            provider: Some(client),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            status: ConnectionStatus::Error(message),
            ..Self::default()
        }
    }
}

/// Notifications for whoever renders or depends on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected {
        address: Address,
        source: ProviderSource,
    },
    /// Same provider, different selected account
    AccountSwitched { address: Address },
    Disconnected,
    /// The wallet moved to another chain; every derived value is stale
    ReloadRequired { chain_id: u64 },
}

/// Result of the OKX connect action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Address),
    /// Open `deep_link`; if the app is not installed, go to `fallback_url`
    Redirect {
        deep_link: String,
        fallback_url: String,
    },
}

struct Registration {
    provider: Arc<dyn WalletProvider>,
    kind: ProviderEventKind,
    id: ListenerId,
}

pub struct ConnectionManager {
    env: Environment,
    network: &'static NetworkProfile,
    state: Arc<RwLock<ConnectionState>>,
    events: broadcast::Sender<SessionEvent>,
    connecting: AtomicBool,
    registrations: Mutex<Option<Vec<Registration>>>,
}

impl ConnectionManager {
    /// Manager targeting the build's current network
    pub fn new(env: Environment) -> Self {
        Self::with_network(env, NetworkProfile::current())
    }

    pub fn with_network(env: Environment, network: &'static NetworkProfile) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            env,
            network,
            state: Arc::new(RwLock::new(ConnectionState::default())),
            events,
            connecting: AtomicBool::new(false),
            registrations: Mutex::new(None),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn network(&self) -> &'static NetworkProfile {
        self.network
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().is_connected()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Request accounts from `source` and make sure the wallet is on the
    /// target network
    pub async fn connect(&self, source: ProviderSource) -> Result<Address, ConnectError> {
        let _guard = InFlight::try_acquire(&self.connecting).ok_or(ConnectError::InProgress)?;

        let Some(provider) = self.env.provider(source) else {
            let err = match source {
                ProviderSource::Ethereum if self.env.is_mobile() => ConnectError::NoWalletDetected,
                ProviderSource::Ethereum => ConnectError::MetaMaskNotInstalled,
                ProviderSource::OkxWallet => ConnectError::OkxNotInstalled,
            };
            self.fail(source, &err);
            return Err(err);
        };

        {
            let mut state = self.state.write();
            *state = ConnectionState {
                status: ConnectionStatus::Connecting,
                ..ConnectionState::default()
            };
        }
        tracing::info!("Connecting to {} ({})", source.wallet_name(), provider.name());

        match self.establish(source, Web3Client::new(provider)).await {
            Ok((address, connected)) => {
                tracing::info!(
                    "Connected {} on chain {:?} via {}",
                    address,
                    connected.chain_id,
                    source.wallet_name()
                );
                *self.state.write() = connected;
                let _ = self.events.send(SessionEvent::Connected { address, source });
                Ok(address)
            }
            Err(err) => {
                self.fail(source, &err);
                Err(err)
            }
        }
    }

    /// OKX flow; on mobile outside the OKX app with no injected object
    /// the caller is asked to redirect instead
    pub async fn connect_okx(&self) -> Result<ConnectOutcome, ConnectError> {
        if !self.env.has_provider(ProviderSource::OkxWallet)
            && self.env.is_mobile()
            && !self.env.is_in_okx_app()
        {
            let deep_link = self.env.okx_deep_link();
            tracing::info!("OKX Wallet not injected, redirecting to {}", deep_link);
            return Ok(ConnectOutcome::Redirect {
                deep_link,
                fallback_url: OKX_DOWNLOAD_URL.to_string(),
            });
        }

        self.connect(ProviderSource::OkxWallet)
            .await
            .map(ConnectOutcome::Connected)
    }

    async fn establish(
        &self,
        source: ProviderSource,
        client: Web3Client,
    ) -> Result<(Address, ConnectionState), ConnectError> {
        let accounts = client.request_accounts().await?;
        let address = *accounts.first().ok_or(ConnectError::NoAccounts(source))?;

        let current = client.chain_id().await?;
        let chain_id = if current == self.network.chain_id {
            current
        } else {
            tracing::info!(
                "Wallet is on chain {}, switching to {} ({})",
                current,
                self.network.chain_id,
                self.network.chain_name
            );
            self.ensure_network(&client).await?;
            self.network.chain_id
        };

        Ok((address, ConnectionState::connected(address, Some(chain_id), source, client)))
    }

    async fn ensure_network(&self, client: &Web3Client) -> Result<(), ProviderError> {
        match client.switch_chain(self.network).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unrecognized_chain() => {
                tracing::info!("{} unknown to the wallet, adding it", self.network.chain_name);
                client.add_chain(self.network).await
            }
            Err(e) => Err(e),
        }
    }

    fn fail(&self, source: ProviderSource, err: &ConnectError) {
        tracing::warn!("{} connection error: {}", source.wallet_name(), err);
        *self.state.write() = ConnectionState::failed(err.to_string());
    }

    /// Forget the connection locally; wallet permissions are untouched
    pub fn disconnect(&self) {
        *self.state.write() = ConnectionState::default();
        tracing::info!("Wallet disconnected");
        let _ = self.events.send(SessionEvent::Disconnected);
    }

    /// Pick up an already-authorized account without prompting.
    ///
    /// Only the first present source is checked, OKX first. Failures are
    /// logged and otherwise ignored.
    pub async fn restore_session(&self) -> Option<Address> {
        let _guard = InFlight::try_acquire(&self.connecting)?;

        let source = self.env.present_sources().into_iter().next()?;
        let client = Web3Client::new(self.env.provider(source)?);

        let accounts = match client.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!("Error checking {} wallet: {}", source, e);
                return None;
            }
        };

        let Some(&address) = accounts.first() else {
            tracing::debug!("No authorized {} account", source);
            return None;
        };

        let chain_id = client.chain_id().await.ok();
        *self.state.write() = ConnectionState::connected(address, chain_id, source, client);
        tracing::info!("Restored {} session for {}", source.wallet_name(), address);
        let _ = self.events.send(SessionEvent::Connected { address, source });
        Some(address)
    }

    /// Apply a provider notification from `source`
    pub fn handle_event(&self, source: ProviderSource, event: &ProviderEvent) {
        apply_event(&self.state, &self.events, source, event);
    }

    /// Subscribe to `accountsChanged` and `chainChanged` on every present
    /// provider. Calling it again while attached does nothing.
    pub fn attach_listeners(&self) {
        let mut registrations = self.registrations.lock();
        if registrations.is_some() {
            return;
        }

        let mut attached = Vec::new();
        for source in self.env.present_sources() {
            let Some(provider) = self.env.provider(source) else {
                continue;
            };
            for kind in [ProviderEventKind::AccountsChanged, ProviderEventKind::ChainChanged] {
                let state = Arc::clone(&self.state);
                let events = self.events.clone();
                let listener: EventListener =
                    Arc::new(move |event: &ProviderEvent| apply_event(&state, &events, source, event));
                let id = provider.on(kind, listener);
                attached.push(Registration {
                    provider: Arc::clone(&provider),
                    kind,
                    id,
                });
            }
            tracing::debug!("Listening to {} events", source);
        }

        *registrations = Some(attached);
    }

    /// Remove exactly the listeners added by [`attach_listeners`](Self::attach_listeners)
    pub fn detach_listeners(&self) {
        if let Some(attached) = self.registrations.lock().take() {
            for registration in attached {
                if !registration.provider.remove_listener(registration.kind, registration.id) {
                    tracing::debug!(
                        "{} listener on {} was already gone",
                        registration.kind,
                        registration.provider.name()
                    );
                }
            }
        }
    }

    pub fn listeners_attached(&self) -> bool {
        self.registrations.lock().is_some()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.detach_listeners();
    }
}

fn apply_event(
    state: &RwLock<ConnectionState>,
    events: &broadcast::Sender<SessionEvent>,
    source: ProviderSource,
    event: &ProviderEvent,
) {
    match event {
        ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
            None => {
                *state.write() = ConnectionState::default();
                tracing::info!("{} reported no accounts, disconnected", source);
                let _ = events.send(SessionEvent::Disconnected);
            }
            Some(&address) => {
                let mut guard = state.write();
                if !guard.is_connected() || guard.source != Some(source) {
                    tracing::debug!("Ignoring {} account change while not connected to it", source);
                    return;
                }
                guard.address = Some(address);
                drop(guard);
                tracing::info!("Account switched to {}", address);
                let _ = events.send(SessionEvent::AccountSwitched { address });
            }
        },
        ProviderEvent::ChainChanged(chain_id) => {
            *state.write() = ConnectionState::default();
            tracing::info!("{} switched to chain {}, reload required", source, chain_id);
            let _ = events.send(SessionEvent::ReloadRequired { chain_id: *chain_id });
        }
    }
}
