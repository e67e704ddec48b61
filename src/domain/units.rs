//! Unit Conversion
//!
//! Converts between smallest-unit integers (wei) and human-readable decimal
//! strings scaled by a token's decimal places. Scaling is done by
//! `alloy_primitives::utils`; this module only adds the input checks and the
//! ethers output shape.

use alloy_primitives::utils::{self, UnitsError};
use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,
    #[error("Invalid decimal amount: {0}")]
    InvalidNumber(String),
    #[error("Fractional component exceeds {0} decimals")]
    TooManyDecimals(u8),
    #[error(transparent)]
    Units(#[from] UnitsError),
}

/// Format a raw integer quantity as a decimal string.
///
/// Mirrors the ethers `formatUnits` shape: at least one fractional digit is
/// kept ("1.0"), trailing zeros are trimmed. With `decimals == 0` the plain
/// integer is returned.
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }

    match utils::format_units(value, decimals) {
        Ok(formatted) => {
            let trimmed = formatted.trim_end_matches('0');
            if trimmed.ends_with('.') {
                format!("{}0", trimmed)
            } else {
                trimmed.to_string()
            }
        }
        Err(_) => value.to_string(),
    }
}

/// Format a wei amount with 18 decimals
pub fn format_ether(value: U256) -> String {
    format_units(value, 18)
}

/// Parse an unsigned decimal string into its smallest-unit integer
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }

    let well_formed = amount.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && amount.bytes().any(|b| b.is_ascii_digit())
        && amount.matches('.').count() <= 1;
    if !well_formed {
        return Err(AmountError::InvalidNumber(amount.to_string()));
    }

    // utils::parse_units truncates extra digits; only trailing zeros may go
    if let Some((_, fraction)) = amount.split_once('.') {
        if fraction.trim_end_matches('0').len() > decimals as usize {
            return Err(AmountError::TooManyDecimals(decimals));
        }
    }

    Ok(utils::parse_units(amount, decimals)?.get_absolute())
}

/// Parse an ether amount with 18 decimals
pub fn parse_ether(amount: &str) -> Result<U256, AmountError> {
    parse_units(amount, 18)
}
