//! Swap Validation
//!
//! Pure checks run before any value transfer is attempted. The first failing
//! check wins.

use alloy_primitives::U256;
use thiserror::Error;

use super::sale::{SaleParameters, WindowStatus};
use super::units::{format_units, parse_units};

/// Reasons a swap request is refused before submission
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please connect your wallet and enter an amount")]
    NotConnected,
    #[error("Please enter an amount")]
    EmptyAmount,
    #[error("The sale has not started yet (opens at {starts_at})")]
    SaleNotStarted { starts_at: u64 },
    #[error("The sale has ended (closed at {ended_at})")]
    SaleEnded { ended_at: u64 },
    #[error("Please enter a valid amount")]
    InvalidAmount,
    #[error("Minimum contribution is {min} {symbol}")]
    BelowMinimum { min: String, symbol: String },
    #[error("Maximum contribution is {max} {symbol}")]
    AboveMaximum { max: String, symbol: String },
    #[error("Insufficient {symbol} balance")]
    InsufficientBalance { symbol: String },
}

impl ValidationError {
    /// Whether the refusal comes from the sale window
    pub fn is_window_closed(&self) -> bool {
        matches!(self, ValidationError::SaleNotStarted { .. } | ValidationError::SaleEnded { .. })
    }
}

/// Everything the validator looks at
#[derive(Debug, Clone)]
pub struct SwapRequest<'a> {
    pub connected: bool,
    pub has_signer: bool,
    pub amount: &'a str,
    /// Current native balance as a decimal string
    pub balance: &'a str,
    pub params: &'a SaleParameters,
    /// Unix seconds
    pub now: u64,
    pub decimals: u8,
    pub symbol: &'a str,
}

/// Validate a swap request, returning the amount in the smallest unit
pub fn validate_swap(request: &SwapRequest<'_>) -> Result<U256, ValidationError> {
    if !request.connected || !request.has_signer {
        return Err(ValidationError::NotConnected);
    }

    if request.amount.trim().is_empty() {
        return Err(ValidationError::EmptyAmount);
    }

    match request.params.window_status(request.now) {
        WindowStatus::NotStarted { starts_at } => {
            return Err(ValidationError::SaleNotStarted { starts_at })
        }
        WindowStatus::Ended { ended_at } => return Err(ValidationError::SaleEnded { ended_at }),
        WindowStatus::Open => {}
    }

    let amount = parse_units(request.amount, request.decimals)
        .map_err(|_| ValidationError::InvalidAmount)?;
    if amount.is_zero() {
        return Err(ValidationError::InvalidAmount);
    }

    let min = request.params.min_contribution;
    if !min.is_zero() && amount < min {
        return Err(ValidationError::BelowMinimum {
            min: format_units(min, request.decimals),
            symbol: request.symbol.to_string(),
        });
    }

    let max = request.params.max_contribution;
    if !max.is_zero() && amount > max {
        return Err(ValidationError::AboveMaximum {
            max: format_units(max, request.decimals),
            symbol: request.symbol.to_string(),
        });
    }

    // An unreadable balance counts as zero
    let balance = parse_units(request.balance, request.decimals).unwrap_or(U256::ZERO);
    if amount > balance {
        return Err(ValidationError::InsufficientBalance {
            symbol: request.symbol.to_string(),
        });
    }

    Ok(amount)
}
