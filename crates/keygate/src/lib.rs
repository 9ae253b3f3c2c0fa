//! # Keygate
//!
//! Authorization core for a set of cooperating services. Keygate issues and
//! verifies bearer tokens, maps each caller to a ranked permission set,
//! binds accounts to miners one-to-one and keeps per-account rate-limit
//! rules.
//!
//! [`Keygate::builder`] wires every service over one record store:
//!
//! ```no_run
//! # async fn demo() -> keygate::Result<()> {
//! use keygate::{CreateAccount, Keygate, KeygateConfig, Permission, RequestContext, RequestMeta};
//!
//! let keygate = Keygate::in_memory(&KeygateConfig::default())?;
//! let admin = RequestContext::local_admin();
//!
//! keygate.accounts().create(&admin, &CreateAccount::new("bob")).await?;
//! keygate.accounts().activate(&admin, "bob").await?;
//! let token = keygate.tokens().generate(&admin, "bob", Permission::Write, "").await?;
//!
//! let request = RequestContext::new(RequestMeta::from_ip("10.0.0.7"));
//! let caller = keygate.verifier().verify_into(&request, &token).await?;
//! caller.require(Permission::Read)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod telemetry;

use std::sync::Arc;

use keygate_auth::TracingAuditSink;
use keygate_core::RealTimeHandler;
use keygate_store::RecordStore;

pub use keygate_accounts::{
    AccountService, AddRateLimit, MinerGuard, RateLimitService, RuleDeletion,
};
pub use keygate_auth::{
    AuditSink, HmacTokenCodec, RecordingAuditSink, TokenCodec, TokenService, TokenVerifier,
    VerifiedCaller, VerifyAudit,
};
pub use keygate_core::{
    Account, AccountPatch, AccountQuery, AccountState, CreateAccount, ErrorKind, KeygateConfig,
    KeygateError, ListAccountsRequest, Page, Permission, RateLimitRule, RequestContext,
    RequestMeta, Result, RewardPoolState, SimulatedTimeHandler, TimeEffects, TokenRecord,
    UpdateAccountRequest, WindowBudget,
};
pub use keygate_store::MemoryStore;
pub use telemetry::init_tracing;

/// Every Keygate service over one shared store
pub struct Keygate<S> {
    store: Arc<S>,
    accounts: AccountService<S>,
    rate_limits: RateLimitService<S>,
    tokens: TokenService<S>,
    verifier: TokenVerifier<S>,
}

impl<S> std::fmt::Debug for Keygate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keygate").finish_non_exhaustive()
    }
}

impl Keygate<MemoryStore> {
    /// Services over a fresh in-memory store
    pub fn in_memory(config: &KeygateConfig) -> Result<Self> {
        Self::builder(Arc::new(MemoryStore::new()))
            .config(config.clone())
            .build()
    }
}

impl<S: RecordStore + 'static> Keygate<S> {
    /// Start assembling services over `store`
    pub fn builder(store: Arc<S>) -> KeygateBuilder<S> {
        KeygateBuilder::new(store)
    }

    /// The shared record store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Account lifecycle
    pub fn accounts(&self) -> &AccountService<S> {
        &self.accounts
    }

    /// Rate-limit rules
    pub fn rate_limits(&self) -> &RateLimitService<S> {
        &self.rate_limits
    }

    /// Token registry
    pub fn tokens(&self) -> &TokenService<S> {
        &self.tokens
    }

    /// Token verification
    pub fn verifier(&self) -> &TokenVerifier<S> {
        &self.verifier
    }
}

/// Assembles a [`Keygate`]
pub struct KeygateBuilder<S> {
    store: Arc<S>,
    config: KeygateConfig,
    clock: Option<Arc<dyn TimeEffects>>,
    codec: Option<Arc<dyn TokenCodec>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<S: RecordStore + 'static> KeygateBuilder<S> {
    fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: KeygateConfig::default(),
            clock: None,
            codec: None,
            audit: None,
        }
    }

    /// Replace the default configuration
    pub fn config(mut self, config: KeygateConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock for every server-side timestamp; the system clock by default
    pub fn clock(mut self, clock: Arc<dyn TimeEffects>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Token codec; by default an HMAC codec keyed from `[token] secret`
    pub fn codec(mut self, codec: Arc<dyn TokenCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Verification audit destination; `tracing` by default
    pub fn audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate the configuration and build the services
    pub fn build(self) -> Result<Keygate<S>> {
        self.config.validate()?;

        let clock: Arc<dyn TimeEffects> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(RealTimeHandler::new()),
        };
        let codec: Arc<dyn TokenCodec> = match self.codec {
            Some(codec) => codec,
            None => Arc::new(HmacTokenCodec::from_config(&self.config.token)?),
        };
        let audit: Arc<dyn AuditSink> = match self.audit {
            Some(audit) => audit,
            None => Arc::new(TracingAuditSink),
        };

        let store = self.store;
        let listing = self.config.listing;
        tracing::info!(
            ttl_secs = self.config.token.ttl_secs,
            default_limit = listing.default_limit,
            max_limit = listing.max_limit,
            "keygate services ready"
        );

        Ok(Keygate {
            accounts: AccountService::new(store.clone(), clock.clone())
                .with_listing(listing.clone()),
            rate_limits: RateLimitService::new(store.clone()),
            tokens: TokenService::new(store.clone(), codec.clone(), clock.clone())
                .with_ttl(self.config.token.ttl_secs)
                .with_listing(listing),
            verifier: TokenVerifier::new(store.clone(), codec, clock).with_audit_sink(audit),
            store,
        })
    }
}
