//! # Keygate Store
//!
//! The record-store surface the Keygate services consume, and an in-memory
//! implementation.
//!
//! The traits describe what the services need from a storage engine: atomic
//! single-record writes, list-with-filter, and a unique miner index that is
//! enforced by the store itself. The services pre-check miner ownership only
//! to produce early, readable errors; the store's constraint is what keeps
//! concurrent writers from double-binding a miner.

#![forbid(unsafe_code)]

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{
    AccountMutation, AccountStore, RateLimitStore, RecordStore, RuleInsert, TokenStore,
};
