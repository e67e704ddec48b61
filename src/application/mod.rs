//! Application Layer - Use Cases
//!
//! Services that drive the domain through the ports:
//! - Connection: wallet connect / disconnect state machine
//! - Balance, sale parameters, progress: read-side fetchers with polling
//! - Exchange: validation and submission of the value transfer
//! - Session: wiring for a front end

pub mod balance;
pub mod connection;
pub mod exchange;
pub mod fetch;
mod in_flight;
pub mod progress;
pub mod sale_params;
pub mod session;

pub use balance::{fetch_balance, BalanceReading, BalanceTracker, BALANCE_POLL_INTERVAL};
pub use connection::{
    ConnectError, ConnectOutcome, ConnectionManager, ConnectionState, SessionEvent,
};
pub use exchange::{
    ExchangeSubmitter, SubmitterConfig, SwapError, SwapReceipt, SwapStage, DEFAULT_GAS_LIMIT,
    FALLBACK_EXCHANGE_RATE,
};
pub use fetch::FetchError;
pub use progress::{ProgressReading, ProgressTracker, PROGRESS_POLL_INTERVAL};
pub use sale_params::SaleParamsFetcher;
pub use session::{ExchangeSession, SessionConfig, SessionSnapshot};
