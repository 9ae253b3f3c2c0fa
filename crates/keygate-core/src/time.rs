//! Time effects
//!
//! Every server-side timestamp comes from a [`TimeEffects`] handler so tests
//! can drive the clock deterministically.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock time source
#[async_trait]
pub trait TimeEffects: Send + Sync {
    /// Current Unix timestamp in milliseconds
    async fn current_timestamp_ms(&self) -> u64;

    /// Current Unix timestamp in seconds
    async fn current_timestamp(&self) -> u64 {
        self.current_timestamp_ms().await / 1000
    }
}

#[async_trait]
impl<T: TimeEffects + ?Sized> TimeEffects for Arc<T> {
    async fn current_timestamp_ms(&self) -> u64 {
        (**self).current_timestamp_ms().await
    }
}

/// System clock handler for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeEffects for RealTimeHandler {
    async fn current_timestamp_ms(&self) -> u64 {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually driven clock for tests
#[derive(Debug, Clone, Default)]
pub struct SimulatedTimeHandler {
    current_ms: Arc<AtomicU64>,
}

impl SimulatedTimeHandler {
    /// Clock starting at `start_ms`
    pub fn new(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Clock starting at `start_secs` seconds after the epoch
    pub fn from_secs(start_secs: u64) -> Self {
        Self::new(start_secs.saturating_mul(1000))
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the absolute time in milliseconds
    pub fn set_time_ms(&self, ms: u64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }

    /// Current simulated time in milliseconds
    pub fn time_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeEffects for SimulatedTimeHandler {
    async fn current_timestamp_ms(&self) -> u64 {
        self.time_ms()
    }
}
