//! Per-account request rate limits
//!
//! A [`RateLimitRule`] is configuration: at most `capacity` requests per
//! `reset_duration`. Enforcement uses a fixed window ([`WindowBudget`]); the
//! budget is a plain value and whoever enforces owns its state.

use crate::{KeygateError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named throttling rule owned by one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRule {
    /// Rule identifier, unique per account
    pub id: String,
    /// Owning account name
    pub account: String,
    /// Requests permitted per window
    pub capacity: u64,
    /// Window length
    pub reset_duration: Duration,
}

impl RateLimitRule {
    /// Build a validated rule
    pub fn new(
        account: impl Into<String>,
        id: impl Into<String>,
        capacity: u64,
        reset_duration: Duration,
    ) -> Result<Self> {
        validate_limits(capacity, reset_duration)?;
        Ok(Self {
            id: id.into(),
            account: account.into(),
            capacity,
            reset_duration,
        })
    }

    /// Fresh budget whose first window opens at `now_ms`
    pub fn budget(&self, now_ms: u64) -> WindowBudget {
        WindowBudget::new(self.capacity, self.reset_duration, now_ms)
    }
}

/// Reject a zero capacity or a zero reset duration
pub fn validate_limits(capacity: u64, reset_duration: Duration) -> Result<()> {
    if capacity == 0 {
        return Err(KeygateError::invalid_argument(
            "rate limit capacity must be positive",
        ));
    }
    if reset_duration.is_zero() {
        return Err(KeygateError::invalid_argument(
            "reset duration must be positive",
        ));
    }
    Ok(())
}

/// Fixed-window request budget.
///
/// `spent` counts admissions since `window_start`; once `window_ms` has
/// elapsed the window rolls forward to the current instant and `spent`
/// resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBudget {
    /// Admissions permitted per window
    pub capacity: u64,
    /// Admissions in the current window
    pub spent: u64,
    /// Window start (Unix milliseconds)
    pub window_start: u64,
    /// Window length in milliseconds, at least 1
    pub window_ms: u64,
}

impl WindowBudget {
    /// Budget with an empty window starting at `now_ms`
    pub fn new(capacity: u64, reset_duration: Duration, now_ms: u64) -> Self {
        let window_ms = u64::try_from(reset_duration.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        Self {
            capacity,
            spent: 0,
            window_start: now_ms,
            window_ms,
        }
    }

    /// Roll the window if it has elapsed at `now_ms`
    pub fn refresh(&mut self, now_ms: u64) {
        if now_ms >= self.resets_at() {
            self.window_start = now_ms;
            self.spent = 0;
        }
    }

    /// Admit one request if the window still has headroom
    pub fn try_acquire(&mut self, now_ms: u64) -> bool {
        self.refresh(now_ms);
        if self.spent < self.capacity {
            self.spent = self.spent.saturating_add(1);
            true
        } else {
            false
        }
    }

    /// Remaining admissions at `now_ms`
    pub fn remaining(&self, now_ms: u64) -> u64 {
        if now_ms >= self.resets_at() {
            self.capacity
        } else {
            self.capacity.saturating_sub(self.spent)
        }
    }

    /// When the current window ends (Unix milliseconds)
    pub fn resets_at(&self) -> u64 {
        self.window_start.saturating_add(self.window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_rule_validation() {
        assert!(RateLimitRule::new("alice", "r1", 10, Duration::from_secs(3600)).is_ok());
        assert_matches!(
            RateLimitRule::new("alice", "r1", 0, Duration::from_secs(1)),
            Err(KeygateError::InvalidArgument { .. })
        );
        assert_matches!(
            RateLimitRule::new("alice", "r1", 1, Duration::ZERO),
            Err(KeygateError::InvalidArgument { .. })
        );
    }

    #[test]
    fn test_window_admits_capacity_then_resets() {
        let rule = RateLimitRule::new("alice", "r1", 3, Duration::from_secs(60)).unwrap();
        let mut budget = rule.budget(1_000);

        assert!(budget.try_acquire(1_000));
        assert!(budget.try_acquire(2_000));
        assert!(budget.try_acquire(3_000));
        assert!(!budget.try_acquire(4_000));
        assert_eq!(budget.remaining(4_000), 0);

        assert_eq!(budget.resets_at(), 61_000);
        assert_eq!(budget.remaining(61_000), 3);
        assert!(budget.try_acquire(61_000));
        assert_eq!(budget.window_start, 61_000);
        assert_eq!(budget.spent, 1);
    }

    #[test]
    fn test_sub_millisecond_window_is_clamped() {
        let budget = WindowBudget::new(1, Duration::from_nanos(10), 0);
        assert_eq!(budget.window_ms, 1);
    }
}
