//! # Keygate Core
//!
//! Foundation types for the Keygate authorization service:
//!
//! - **Permissions**: ranked permissions and their expansion
//! - **Request context**: explicit, per-request carrier of caller identity
//!   and permissions
//! - **Accounts**: the account record, reward-pool state machine and the
//!   field-mask partial-update protocol
//! - **Rate limits**: per-account throttling rules and fixed-window budgets
//! - **Infrastructure**: unified errors, pagination, time effects and
//!   configuration
//!
//! This crate holds no storage or service logic; see `keygate-store`,
//! `keygate-auth` and `keygate-accounts`.

#![forbid(unsafe_code)]

pub mod account;
pub mod config;
pub mod context;
pub mod errors;
pub mod mask;
pub mod page;
pub mod permission;
pub mod rate_limit;
pub mod time;
pub mod token;

pub use account::{
    Account, AccountField, AccountPatch, AccountQuery, AccountState, CreateAccount,
    ListAccountsRequest, QueryField, RewardPoolState, UpdateAccountRequest, SOURCE_TYPE_MINER,
};
pub use config::{KeygateConfig, ListingConfig, LoggingConfig, TokenConfig};
pub use context::{RequestContext, RequestMeta};
pub use errors::{ErrorKind, KeygateError, Result};
pub use mask::{FieldMask, MaskField};
pub use page::Page;
pub use permission::Permission;
pub use rate_limit::{RateLimitRule, WindowBudget};
pub use time::{RealTimeHandler, SimulatedTimeHandler, TimeEffects};
pub use token::TokenRecord;
