//! Rate-limit rule lifecycle

use keygate_core::rate_limit::validate_limits;
use keygate_core::{
    KeygateError, Permission, RateLimitRule, RequestContext, Result, WindowBudget,
};
use keygate_store::{AccountStore, RateLimitStore, RuleInsert};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Request to add a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRateLimit {
    /// Owning account; must be live
    pub account: String,
    /// Requests allowed per window
    pub capacity: u64,
    /// Window length
    pub reset_duration: Duration,
    /// Caller-chosen id. Without one the account must hold no rule yet and
    /// a fresh id is assigned.
    pub id: Option<String>,
}

impl AddRateLimit {
    /// Request without an id
    pub fn new(account: impl Into<String>, capacity: u64, reset_duration: Duration) -> Self {
        Self {
            account: account.into(),
            capacity,
            reset_duration,
            id: None,
        }
    }

    /// Use `id` instead of a generated one
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Outcome of [`RateLimitService::delete`], as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDeletion {
    /// The rule existed and is gone
    Removed,
    /// Nothing was stored under the id
    Absent,
}

/// Rule operations over the rate-limit and account stores.
/// Reads require `read`; mutations require `admin`. Every operation fails
/// `NotFound` when the account is missing or soft-deleted.
pub struct RateLimitService<S> {
    store: Arc<S>,
}

impl<S: AccountStore + RateLimitStore> RateLimitService<S> {
    /// Service over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Add a rule and return its id.
    ///
    /// The conflict check is repeated inside the store insert, so of two
    /// concurrent adds exactly one succeeds and the other fails
    /// `AlreadyExists`.
    pub async fn add(&self, ctx: &RequestContext, request: &AddRateLimit) -> Result<String> {
        ctx.require(Permission::Admin)?;
        validate_limits(request.capacity, request.reset_duration)?;

        let account = &request.account;
        self.ensure_live(account).await?;

        let (id, mode) = match request.id.as_deref() {
            Some(id) if !id.is_empty() => (id.to_string(), RuleInsert::Keyed),
            _ => (Uuid::new_v4().to_string(), RuleInsert::Exclusive),
        };
        let taken = match mode {
            RuleInsert::Exclusive => !self.store.rules_for(account).await?.is_empty(),
            RuleInsert::Keyed => self.store.get_rule(account, &id).await?.is_some(),
        };
        if taken {
            return Err(KeygateError::already_exists(format!(
                "rate limit for {account} already exists"
            )));
        }

        let rule = RateLimitRule::new(
            account.as_str(),
            id.as_str(),
            request.capacity,
            request.reset_duration,
        )?;
        self.store.insert_rule(rule, mode).await?;
        debug!(
            account = %account,
            rule_id = %id,
            capacity = request.capacity,
            reset_secs = request.reset_duration.as_secs(),
            "rate limit added"
        );
        Ok(id)
    }

    /// Replace the limits of an existing rule
    pub async fn update(
        &self,
        ctx: &RequestContext,
        account: &str,
        id: &str,
        capacity: u64,
        reset_duration: Duration,
    ) -> Result<()> {
        ctx.require(Permission::Admin)?;
        self.ensure_live(account).await?;
        let rule = RateLimitRule::new(account, id, capacity, reset_duration)?;
        self.store.update_rule(rule).await?;
        debug!(account = %account, rule_id = %id, capacity, "rate limit updated");
        Ok(())
    }

    /// All rules of `account`, or only the one named `id`. A missing rule
    /// yields an empty result.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        account: &str,
        id: Option<&str>,
    ) -> Result<Vec<RateLimitRule>> {
        ctx.require(Permission::Read)?;
        self.ensure_live(account).await?;
        match id {
            Some(id) => Ok(self.store.get_rule(account, id).await?.into_iter().collect()),
            None => self.store.rules_for(account).await,
        }
    }

    /// Delete a rule, reporting what the store actually did
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        account: &str,
        id: &str,
    ) -> Result<RuleDeletion> {
        ctx.require(Permission::Admin)?;
        self.ensure_live(account).await?;
        let existed = self.store.get_rule(account, id).await?.is_some();
        let removed = self.store.delete_rule(account, id).await?;
        if existed != removed {
            warn!(
                account = %account,
                rule_id = %id,
                existed,
                removed,
                "rate limit changed between check and delete"
            );
        }

        if removed {
            debug!(account = %account, rule_id = %id, "rate limit deleted");
            Ok(RuleDeletion::Removed)
        } else {
            Ok(RuleDeletion::Absent)
        }
    }

    /// Fresh fixed-window budgets for every rule of `account`, keyed by
    /// rule id, with windows opening at `now_ms`
    pub async fn budget(
        &self,
        ctx: &RequestContext,
        account: &str,
        now_ms: u64,
    ) -> Result<BTreeMap<String, WindowBudget>> {
        ctx.require(Permission::Read)?;
        self.ensure_live(account).await?;
        Ok(self
            .store
            .rules_for(account)
            .await?
            .into_iter()
            .map(|rule| {
                let budget = rule.budget(now_ms);
                (rule.id, budget)
            })
            .collect())
    }

    async fn ensure_live(&self, account: &str) -> Result<()> {
        match self.store.get_account(account).await? {
            Some(found) if !found.deleted => Ok(()),
            _ => Err(KeygateError::not_found(format!(
                "account {account} not found"
            ))),
        }
    }
}
