//! Miner-uniqueness pre-check
//!
//! The guard reads the store's miner index to reject a double binding with
//! a readable error before any write. It is not what keeps two concurrent
//! writers apart: the store's unique index rejects the loser with the same
//! `MinerBound` error.

use keygate_core::{KeygateError, Result};
use keygate_store::AccountStore;
use std::sync::Arc;

/// Read-only check against the miner index
pub struct MinerGuard<S> {
    store: Arc<S>,
}

impl<S> Clone for MinerGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: AccountStore> MinerGuard<S> {
    /// Guard over the miner index of `store`
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Whether no account, deleted or not, holds `miner`
    pub async fn check_available(&self, miner: &str) -> Result<bool> {
        Ok(self.store.account_by_miner(miner).await?.is_none())
    }

    /// Fail `MinerBound` unless `miner` is unowned or owned by `owner`
    pub async fn ensure_available(&self, miner: &str, owner: &str) -> Result<()> {
        match self.store.account_by_miner(miner).await? {
            Some(bound) if bound.name != owner => Err(KeygateError::miner_bound(format!(
                "miner {miner} is bound to {}",
                bound.name
            ))),
            _ => Ok(()),
        }
    }
}
