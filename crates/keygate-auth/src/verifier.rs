//! Token verification
//!
//! Turns a bearer string into a caller identity and permission set, then
//! attaches both to a [`RequestContext`]. Verification only reads the
//! store.

use crate::audit::{AuditSink, TracingAuditSink, VerifyAudit};
use crate::codec::TokenCodec;
use keygate_core::{
    AccountState, KeygateError, Permission, RequestContext, RequestMeta, Result, TimeEffects,
};
use keygate_store::{AccountStore, TokenStore};
use std::sync::Arc;
use std::time::Instant;

/// Identity established by a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCaller {
    /// Account name
    pub name: String,
    /// Expanded permission sequence, highest rank first
    pub permissions: Vec<Permission>,
}

impl VerifiedCaller {
    /// Derive a context carrying this caller
    pub fn attach(&self, ctx: &RequestContext) -> RequestContext {
        ctx.with_identity(self.name.as_str())
            .with_permissions(self.permissions.clone())
    }
}

/// Verifies bearer tokens against the codec, the token registry and the
/// account table
pub struct TokenVerifier<S> {
    store: Arc<S>,
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn TimeEffects>,
    audit: Arc<dyn AuditSink>,
}

impl<S> Clone for TokenVerifier<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
            clock: self.clock.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<S: AccountStore + TokenStore> TokenVerifier<S> {
    /// Verifier auditing through `tracing`
    pub fn new(store: Arc<S>, codec: Arc<dyn TokenCodec>, clock: Arc<dyn TimeEffects>) -> Self {
        Self {
            store,
            codec,
            clock,
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Replace the audit sink
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Verify `token`, emitting one audit record whatever the outcome.
    ///
    /// Undecodable, expired and unregistered tokens fail `Unauthenticated`.
    /// Revoked tokens and tokens of missing, deleted or disabled accounts
    /// fail `Forbidden`.
    pub async fn verify(&self, meta: &RequestMeta, token: &str) -> Result<VerifiedCaller> {
        let started = Instant::now();
        let outcome = self.resolve(token).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let record = match &outcome {
            Ok(caller) => VerifyAudit::success(meta, elapsed_ms, &caller.name),
            Err(err) => VerifyAudit::failure(meta, elapsed_ms, err),
        };
        self.audit.emit(&record);
        outcome
    }

    /// Verify `token` and attach the caller to `ctx`
    pub async fn verify_into(&self, ctx: &RequestContext, token: &str) -> Result<RequestContext> {
        let caller = self.verify(ctx.meta(), token).await?;
        Ok(caller.attach(ctx))
    }

    async fn resolve(&self, token: &str) -> Result<VerifiedCaller> {
        let token = token.trim();
        if token.is_empty() {
            return Err(KeygateError::unauthenticated("empty token"));
        }

        let claims = self.codec.decode(token)?;
        if claims.is_expired(self.clock.current_timestamp().await) {
            return Err(KeygateError::unauthenticated(format!(
                "token of {} has expired",
                claims.name
            )));
        }

        let record = self
            .store
            .get_token(token)
            .await?
            .ok_or_else(|| KeygateError::unauthenticated("token is not registered"))?;
        if record.deleted {
            return Err(KeygateError::forbidden(format!(
                "token of {} has been revoked",
                record.name
            )));
        }

        let account = match self.store.get_account(&record.name).await? {
            Some(account) if !account.deleted => account,
            _ => {
                return Err(KeygateError::forbidden(format!(
                    "account {} does not exist",
                    record.name
                )))
            }
        };
        if account.state != AccountState::Enabled {
            return Err(KeygateError::forbidden(format!(
                "account {} is disabled",
                account.name
            )));
        }

        Ok(VerifiedCaller {
            name: account.name,
            permissions: record.permission.expand(),
        })
    }
}
