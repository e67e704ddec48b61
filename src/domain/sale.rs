//! Sale Parameters
//!
//! Values read from the sale contract and the derived sale-window and
//! fundraising-progress views.

use alloy_primitives::U256;
use serde::Serialize;

use super::units::format_ether;

/// Sale configuration read from the contract.
///
/// Every field is fetched independently and may be stale. Zero means
/// "not loaded" (or, for the timestamps, "no bound").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaleParameters {
    /// SAIGO per native unit, as an integer
    pub exchange_rate: U256,
    /// Minimum contribution in wei
    pub min_contribution: U256,
    /// Maximum contribution in wei
    pub max_contribution: U256,
    /// Unix seconds, 0 = no lower bound
    pub start_time: u64,
    /// Unix seconds, 0 = no upper bound
    pub end_time: u64,
}

/// Where `now` sits relative to the sale window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    NotStarted { starts_at: u64 },
    Open,
    Ended { ended_at: u64 },
}

impl WindowStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, WindowStatus::Open)
    }
}

impl SaleParameters {
    /// Classify `now` (unix seconds) against the sale window
    pub fn window_status(&self, now: u64) -> WindowStatus {
        if self.start_time != 0 && now < self.start_time {
            return WindowStatus::NotStarted { starts_at: self.start_time };
        }
        if self.end_time != 0 && now > self.end_time {
            return WindowStatus::Ended { ended_at: self.end_time };
        }
        WindowStatus::Open
    }

    pub fn is_window_open(&self, now: u64) -> bool {
        self.window_status(now).is_open()
    }

    pub fn min_contribution_formatted(&self) -> String {
        format_ether(self.min_contribution)
    }

    pub fn max_contribution_formatted(&self) -> String {
        format_ether(self.max_contribution)
    }

    /// Rate as a plain integer string
    pub fn exchange_rate_formatted(&self) -> String {
        self.exchange_rate.to_string()
    }
}

/// Fundraising totals read from the contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FundraisingProgress {
    /// Hard cap in wei
    pub max_cap: U256,
    /// Amount received so far in wei
    pub total_received: U256,
}

impl FundraisingProgress {
    /// Percentage raised, clamped to [0, 100] with two decimal places
    pub fn percentage(&self) -> f64 {
        if self.max_cap.is_zero() {
            return 0.0;
        }
        // basis points keep two decimals without going through floats on 256-bit values
        let bps = self.total_received.saturating_mul(U256::from(10_000u64)) / self.max_cap;
        let bps = if bps > U256::from(10_000u64) { 10_000u64 } else { bps.to::<u64>() };
        bps as f64 / 100.0
    }

    pub fn max_cap_formatted(&self) -> String {
        format_ether(self.max_cap)
    }

    pub fn total_received_formatted(&self) -> String {
        format_ether(self.total_received)
    }

    /// Whether the cap has been reached
    pub fn is_complete(&self) -> bool {
        !self.max_cap.is_zero() && self.total_received >= self.max_cap
    }
}
