//! Read-side failures
//!
//! Errors from the balance, sale parameter and progress fetchers. They are
//! recorded next to the cached values rather than propagated.

use thiserror::Error;

use crate::ports::wallet::ProviderError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Failed to fetch {symbol} balance: {source}")]
    Balance {
        symbol: String,
        #[source]
        source: ProviderError,
    },
    #[error("Failed to fetch exchange parameters ({call}): {source}")]
    SaleParameters {
        call: &'static str,
        #[source]
        source: ProviderError,
    },
    #[error("Failed to fetch fundraising progress ({call}): {source}")]
    Progress {
        call: &'static str,
        #[source]
        source: ProviderError,
    },
}
