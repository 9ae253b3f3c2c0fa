//! Account lifecycle
//!
//! Reads require `read`; every mutation requires `admin`. Mutations go
//! through [`AccountStore::modify_account`] so the patch, the reward-pool
//! transition and the miner index change commit together or not at all.

use crate::guard::MinerGuard;
use keygate_core::{
    Account, AccountPatch, AccountQuery, AccountState, CreateAccount, KeygateError, ListingConfig,
    Permission, RequestContext, Result, RewardPoolState, TimeEffects,
};
use keygate_store::AccountStore;
use std::sync::Arc;
use tracing::debug;

fn not_found(name: &str) -> KeygateError {
    KeygateError::not_found(format!("account {name} not found"))
}

/// Account operations over an [`AccountStore`]
pub struct AccountService<S> {
    store: Arc<S>,
    guard: MinerGuard<S>,
    clock: Arc<dyn TimeEffects>,
    listing: ListingConfig,
}

impl<S: AccountStore> AccountService<S> {
    /// Service over `store`, stamping records with `clock`
    pub fn new(store: Arc<S>, clock: Arc<dyn TimeEffects>) -> Self {
        Self {
            guard: MinerGuard::new(store.clone()),
            store,
            clock,
            listing: ListingConfig::default(),
        }
    }

    /// Override the list pagination bounds
    pub fn with_listing(mut self, listing: ListingConfig) -> Self {
        self.listing = listing;
        self
    }

    /// The miner guard shared with this service
    pub fn guard(&self) -> &MinerGuard<S> {
        &self.guard
    }

    /// Create an account.
    ///
    /// Fails `InvalidArgument` for an empty name, `MinerBound` if the miner
    /// is taken and `AlreadyExists` if the name is, deleted accounts
    /// included.
    pub async fn create(&self, ctx: &RequestContext, request: &CreateAccount) -> Result<Account> {
        ctx.require(Permission::Admin)?;
        let now = self.clock.current_timestamp().await;
        let account = Account::from_create(request, now)?;

        if let Some(miner) = &account.miner {
            self.guard.ensure_available(miner, &account.name).await?;
        }
        self.store.insert_account(account.clone()).await?;

        debug!(
            account = %account.name,
            miner = account.miner.as_deref(),
            reward_pool = %account.reward_pool_state,
            "account created"
        );
        Ok(account)
    }

    /// Apply a partial update to a live account
    pub async fn update(
        &self,
        ctx: &RequestContext,
        name: &str,
        patch: &AccountPatch,
    ) -> Result<Account> {
        ctx.require(Permission::Admin)?;
        let current = self.live(name).await?;

        if let Some(miner) = patch.new_miner() {
            if current.miner.as_deref() != Some(miner) {
                self.guard.ensure_available(miner, name).await?;
            }
        }

        let now = self.clock.current_timestamp().await;
        let apply = |account: &mut Account| -> Result<()> {
            if account.deleted {
                return Err(not_found(name));
            }
            account.apply_patch(patch, now)
        };
        let updated = self.store.modify_account(name, &apply).await?;

        debug!(
            account = %name,
            fields = ?patch.fields(),
            "account updated"
        );
        Ok(updated)
    }

    /// Enable an account so its tokens verify
    pub async fn activate(&self, ctx: &RequestContext, name: &str) -> Result<Account> {
        self.update(ctx, name, &AccountPatch::new().state(AccountState::Enabled))
            .await
    }

    /// Join the reward pool with the bound miner
    pub async fn join_reward_pool(&self, ctx: &RequestContext, name: &str) -> Result<Account> {
        let patch = AccountPatch::new().reward_pool_state(RewardPoolState::Joined);
        self.update(ctx, name, &patch).await
    }

    /// Leave the reward pool
    pub async fn exit_reward_pool(&self, ctx: &RequestContext, name: &str) -> Result<Account> {
        let patch = AccountPatch::new().reward_pool_state(RewardPoolState::Exited);
        self.update(ctx, name, &patch).await
    }

    /// Live account by name
    pub async fn get(&self, ctx: &RequestContext, name: &str) -> Result<Account> {
        ctx.require(Permission::Read)?;
        self.live(name).await
    }

    /// Whether a live account is named `name`
    pub async fn has_account(&self, ctx: &RequestContext, name: &str) -> Result<bool> {
        ctx.require(Permission::Read)?;
        Ok(self
            .store
            .get_account(name)
            .await?
            .is_some_and(|account| !account.deleted))
    }

    /// Live accounts matching `query`, ordered by name
    pub async fn list(&self, ctx: &RequestContext, query: &AccountQuery) -> Result<Vec<Account>> {
        ctx.require(Permission::Read)?;
        self.store
            .list_accounts(query, self.listing.bound(query.page))
            .await
    }

    /// Soft-delete. The name and the miner binding stay reserved.
    pub async fn delete(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        ctx.require(Permission::Admin)?;
        let now = self.clock.current_timestamp().await;
        let mark = |account: &mut Account| -> Result<()> {
            if account.deleted {
                return Err(not_found(name));
            }
            account.deleted = true;
            account.update_time = now;
            Ok(())
        };
        self.store.modify_account(name, &mark).await?;
        debug!(account = %name, "account deleted");
        Ok(())
    }

    /// Undo a soft delete
    pub async fn recover(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        ctx.require(Permission::Admin)?;
        let now = self.clock.current_timestamp().await;
        let unmark = |account: &mut Account| -> Result<()> {
            if !account.deleted {
                return Err(KeygateError::invalid_argument(format!(
                    "account {name} is not deleted"
                )));
            }
            account.deleted = false;
            account.update_time = now;
            Ok(())
        };
        self.store.modify_account(name, &unmark).await?;
        debug!(account = %name, "account recovered");
        Ok(())
    }

    /// Live account bound to `miner`
    pub async fn get_by_miner(&self, ctx: &RequestContext, miner: &str) -> Result<Account> {
        ctx.require(Permission::Read)?;
        match self.store.account_by_miner(miner).await? {
            Some(account) if !account.deleted => Ok(account),
            _ => Err(KeygateError::not_found(format!(
                "no account is bound to miner {miner}"
            ))),
        }
    }

    /// Whether any account holds `miner`, soft-deleted ones included
    pub async fn has_miner(&self, ctx: &RequestContext, miner: &str) -> Result<bool> {
        ctx.require(Permission::Read)?;
        Ok(!self.guard.check_available(miner).await?)
    }

    /// Miners bound to a live account: none or one
    pub async fn miners_of(&self, ctx: &RequestContext, name: &str) -> Result<Vec<String>> {
        ctx.require(Permission::Read)?;
        Ok(self.live(name).await?.miner.into_iter().collect())
    }

    /// Bind `miner` to `name`, replacing any previous binding
    pub async fn bind_miner(
        &self,
        ctx: &RequestContext,
        name: &str,
        miner: &str,
    ) -> Result<Account> {
        if miner.trim().is_empty() {
            return Err(KeygateError::invalid_argument("miner is empty"));
        }
        self.update(ctx, name, &AccountPatch::new().miner(miner)).await
    }

    /// Release the miner bound to `name`; a no-op binding-wise if none is
    pub async fn unbind_miner(&self, ctx: &RequestContext, name: &str) -> Result<Account> {
        self.update(ctx, name, &AccountPatch::new().miner("")).await
    }

    async fn live(&self, name: &str) -> Result<Account> {
        match self.store.get_account(name).await? {
            Some(account) if !account.deleted => Ok(account),
            _ => Err(not_found(name)),
        }
    }
}
