//! Clock Port
//!
//! Wall-clock source for sale-window checks.

/// Source of the current unix time in seconds
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}
