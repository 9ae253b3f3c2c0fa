//! Storage surface consumed by the Keygate services
//!
//! Implementations must make every single-record write atomic and must
//! enforce two constraints themselves rather than trusting callers'
//! pre-checks: account names are unique, and a miner identifier is bound to
//! at most one account.

use async_trait::async_trait;
use keygate_core::{Account, AccountQuery, Page, RateLimitRule, Result, TokenRecord};

/// Atomic in-place account mutation, run under the store's write lock
pub type AccountMutation<'a> = &'a (dyn Fn(&mut Account) -> Result<()> + Send + Sync);

/// Account table keyed by name, with a unique secondary index on miner
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account.
    ///
    /// Fails `AlreadyExists` if the name is taken and `MinerBound` if the
    /// account's miner is already indexed.
    async fn insert_account(&self, account: Account) -> Result<()>;

    /// Read-modify-write one account atomically.
    ///
    /// `mutation` sees the stored record (soft-deleted ones included); its
    /// error aborts the write. The miner index is checked and updated in the
    /// same critical section. Fails `NotFound` if `name` is absent.
    async fn modify_account(&self, name: &str, mutation: AccountMutation<'_>) -> Result<Account>;

    /// Account by name, soft-deleted ones included
    async fn get_account(&self, name: &str) -> Result<Option<Account>>;

    /// Account bound to `miner`, soft-deleted ones included
    async fn account_by_miner(&self, miner: &str) -> Result<Option<Account>>;

    /// Non-deleted accounts matching `query`, ordered by name, within `page`
    async fn list_accounts(&self, query: &AccountQuery, page: Page) -> Result<Vec<Account>>;
}

/// How [`RateLimitStore::insert_rule`] checks for conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleInsert {
    /// Reject if the account holds any rule
    Exclusive,
    /// Reject if the account holds a rule with the same id
    Keyed,
}

/// Rate-limit rules keyed by `(account, id)`
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Insert a rule; conflicts per `mode` fail `AlreadyExists`
    async fn insert_rule(&self, rule: RateLimitRule, mode: RuleInsert) -> Result<()>;

    /// Replace an existing rule; fails `NotFound` if absent
    async fn update_rule(&self, rule: RateLimitRule) -> Result<()>;

    /// One rule
    async fn get_rule(&self, account: &str, id: &str) -> Result<Option<RateLimitRule>>;

    /// All rules of an account, ordered by id
    async fn rules_for(&self, account: &str) -> Result<Vec<RateLimitRule>>;

    /// Delete a rule, reporting whether one was removed
    async fn delete_rule(&self, account: &str, id: &str) -> Result<bool>;
}

/// Issued tokens keyed by the encoded token
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Register a token; fails `AlreadyExists` on a duplicate
    async fn insert_token(&self, record: TokenRecord) -> Result<()>;

    /// Token record, revoked ones included
    async fn get_token(&self, token: &str) -> Result<Option<TokenRecord>>;

    /// Non-revoked tokens ordered by issue time, within `page`
    async fn list_tokens(&self, page: Page) -> Result<Vec<TokenRecord>>;

    /// Non-revoked tokens of one account, ordered by issue time
    async fn tokens_for(&self, name: &str) -> Result<Vec<TokenRecord>>;

    /// Set the revocation marker, returning the previous value.
    /// Fails `NotFound` if the token is absent.
    async fn set_token_deleted(&self, token: &str, deleted: bool) -> Result<bool>;
}

/// Every table the services need
pub trait RecordStore: AccountStore + RateLimitStore + TokenStore {}

impl<T: AccountStore + RateLimitStore + TokenStore> RecordStore for T {}
