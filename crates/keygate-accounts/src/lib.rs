//! # Keygate Accounts
//!
//! Services that own the account table and the rate-limit rules:
//!
//! - [`AccountService`]: create, partial update, reward-pool membership,
//!   soft delete and recovery, miner lookups
//! - [`MinerGuard`]: readable pre-check for the one-miner-one-account rule
//! - [`RateLimitService`]: per-account rule lifecycle and fixed-window
//!   budgets
//!
//! Every operation takes the caller's [`RequestContext`](keygate_core::RequestContext)
//! and authorizes against it before touching the store.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod guard;
pub mod rate_limit;
pub mod service;

pub use guard::MinerGuard;
pub use rate_limit::{AddRateLimit, RateLimitService, RuleDeletion};
pub use service::AccountService;
