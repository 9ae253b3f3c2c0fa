//! Token registry
//!
//! Issued tokens are recorded so they can be listed, revoked and restored.
//! A token that verifies cryptographically but is missing from the registry
//! is rejected by the verifier.

use crate::codec::{TokenClaims, TokenCodec};
use keygate_core::{
    KeygateError, ListingConfig, Page, Permission, RequestContext, Result, TimeEffects,
    TokenRecord,
};
use keygate_store::{AccountStore, TokenStore};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Issues and manages bearer tokens. Every operation requires `admin`.
pub struct TokenService<S> {
    store: Arc<S>,
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn TimeEffects>,
    listing: ListingConfig,
    ttl_secs: Option<u64>,
}

impl<S: AccountStore + TokenStore> TokenService<S> {
    /// Service signing with `codec`; tokens never expire by default
    pub fn new(store: Arc<S>, codec: Arc<dyn TokenCodec>, clock: Arc<dyn TimeEffects>) -> Self {
        Self {
            store,
            codec,
            clock,
            listing: ListingConfig::default(),
            ttl_secs: None,
        }
    }

    /// Issue tokens that expire `ttl_secs` after issue
    pub fn with_ttl(mut self, ttl_secs: Option<u64>) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Override the list pagination bounds
    pub fn with_listing(mut self, listing: ListingConfig) -> Self {
        self.listing = listing;
        self
    }

    /// Issue and register a token granting `permission` to `name`
    pub async fn generate(
        &self,
        ctx: &RequestContext,
        name: &str,
        permission: Permission,
        extra: &str,
    ) -> Result<String> {
        ctx.require(Permission::Admin)?;
        match self.store.get_account(name).await? {
            Some(account) if !account.deleted => {}
            _ => {
                return Err(KeygateError::not_found(format!(
                    "account {name} not found"
                )))
            }
        }

        let now = self.clock.current_timestamp().await;
        let claims = TokenClaims {
            name: name.to_string(),
            perm: permission,
            ext: extra.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: self.ttl_secs.map(|ttl| now.saturating_add(ttl)),
        };
        let token = self.codec.encode(&claims)?;

        self.store
            .insert_token(TokenRecord {
                token: token.clone(),
                name: name.to_string(),
                permission,
                extra: extra.to_string(),
                create_time: now,
                deleted: false,
            })
            .await?;
        debug!(account = %name, %permission, "token issued");
        Ok(token)
    }

    /// Registered, non-revoked token
    pub async fn get(&self, ctx: &RequestContext, token: &str) -> Result<TokenRecord> {
        ctx.require(Permission::Admin)?;
        match self.store.get_token(token).await? {
            Some(record) if !record.deleted => Ok(record),
            _ => Err(KeygateError::not_found("token not found")),
        }
    }

    /// Non-revoked tokens in issue order
    pub async fn list(&self, ctx: &RequestContext, page: Page) -> Result<Vec<TokenRecord>> {
        ctx.require(Permission::Admin)?;
        self.store.list_tokens(self.listing.bound(page)).await
    }

    /// Non-revoked tokens of one account
    pub async fn tokens_for(&self, ctx: &RequestContext, name: &str) -> Result<Vec<TokenRecord>> {
        ctx.require(Permission::Admin)?;
        self.store.tokens_for(name).await
    }

    /// Revoke a token
    pub async fn remove(&self, ctx: &RequestContext, token: &str) -> Result<()> {
        let record = self.get(ctx, token).await?;
        if self.store.set_token_deleted(token, true).await? {
            return Err(KeygateError::not_found("token not found"));
        }
        debug!(account = %record.name, "token revoked");
        Ok(())
    }

    /// Undo a revocation
    pub async fn recover(&self, ctx: &RequestContext, token: &str) -> Result<()> {
        ctx.require(Permission::Admin)?;
        let record = self
            .store
            .get_token(token)
            .await?
            .ok_or_else(|| KeygateError::not_found("token not found"))?;
        if !record.deleted {
            return Err(KeygateError::invalid_argument(format!(
                "token of {} is not revoked",
                record.name
            )));
        }
        self.store.set_token_deleted(token, false).await?;
        debug!(account = %record.name, "token recovered");
        Ok(())
    }
}
