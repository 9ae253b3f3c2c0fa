//! End-to-end token issuance, verification and revocation

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use keygate_auth::{
    HmacTokenCodec, RecordingAuditSink, TokenClaims, TokenCodec, TokenService, TokenVerifier,
};
use keygate_core::{
    Account, AccountState, CreateAccount, KeygateError, Page, Permission, RequestContext,
    RequestMeta, Result, SimulatedTimeHandler, TimeEffects,
};
use keygate_store::{AccountStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

const NOW: u64 = 1_700_000_000;

struct Fixture {
    store: Arc<MemoryStore>,
    clock: SimulatedTimeHandler,
    codec: Arc<HmacTokenCodec>,
    audit: RecordingAuditSink,
    tokens: TokenService<MemoryStore>,
    verifier: TokenVerifier<MemoryStore>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_ttl(None)
    }

    fn with_ttl(ttl_secs: Option<u64>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = SimulatedTimeHandler::from_secs(NOW);
        let codec = Arc::new(HmacTokenCodec::new(vec![42u8; 32]));
        let audit = RecordingAuditSink::new();
        let time: Arc<dyn TimeEffects> = Arc::new(clock.clone());

        let tokens = TokenService::new(store.clone(), codec.clone(), time.clone()).with_ttl(ttl_secs);
        let verifier = TokenVerifier::new(store.clone(), codec.clone(), time)
            .with_audit_sink(Arc::new(audit.clone()));

        Self {
            store,
            clock,
            codec,
            audit,
            tokens,
            verifier,
        }
    }

    async fn account(&self, name: &str, state: AccountState) {
        let request = CreateAccount::new(name).with_state(state);
        self.store
            .insert_account(Account::from_create(&request, NOW).unwrap())
            .await
            .unwrap();
    }

    async fn issue(&self, name: &str, permission: Permission) -> String {
        self.tokens
            .generate(&RequestContext::local_admin(), name, permission, "")
            .await
            .unwrap()
    }
}

fn meta() -> RequestMeta {
    RequestMeta::from_ip("192.168.1.7")
        .with_span_id("7f3a")
        .with_svc_name("venus")
}

#[tokio::test]
async fn test_write_token_expands_to_write_and_read() {
    let fx = Fixture::new();
    fx.account("bob", AccountState::Enabled).await;
    let token = fx.issue("bob", Permission::Write).await;

    let caller = fx.verifier.verify(&meta(), &token).await.unwrap();
    assert_eq!(caller.name, "bob");
    assert_eq!(caller.permissions, vec![Permission::Write, Permission::Read]);

    let record = fx.audit.last().unwrap();
    assert_eq!(record.method, "verify");
    assert_eq!(record.name.as_deref(), Some("bob"));
    assert_eq!(record.ip.as_deref(), Some("192.168.1.7"));
    assert_eq!(record.span_id.as_deref(), Some("7f3a"));
    assert_eq!(record.svc_name.as_deref(), Some("venus"));
    assert_eq!(record.error, None);
}

#[tokio::test]
async fn test_verify_into_attaches_caller() {
    let fx = Fixture::new();
    fx.account("bob", AccountState::Enabled).await;
    let token = fx.issue("bob", Permission::Sign).await;

    let base = RequestContext::new(meta());
    let ctx = fx.verifier.verify_into(&base, &token).await.unwrap();

    assert_eq!(ctx.identity(), Some("bob"));
    assert!(ctx.require(Permission::Write).is_ok());
    assert_matches!(
        ctx.require(Permission::Admin),
        Err(KeygateError::Forbidden { .. })
    );
    assert_eq!(base.permissions(), None);
    assert_eq!(ctx.meta(), base.meta());
}

#[tokio::test]
async fn test_malformed_token_is_unauthenticated_and_audited() {
    let fx = Fixture::new();
    assert_matches!(
        fx.verifier.verify(&meta(), "not-a-token").await,
        Err(KeygateError::Unauthenticated { .. })
    );

    let records = fx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, None);
    assert!(records[0].error.is_some());
    assert_eq!(records[0].ip.as_deref(), Some("192.168.1.7"));
}

#[tokio::test]
async fn test_one_audit_record_per_call() {
    let fx = Fixture::new();
    fx.account("bob", AccountState::Enabled).await;
    let token = fx.issue("bob", Permission::Read).await;

    fx.verifier.verify(&meta(), &token).await.unwrap();
    fx.verifier.verify(&meta(), "").await.unwrap_err();
    fx.verifier.verify(&meta(), &token).await.unwrap();
    assert_eq!(fx.audit.records().len(), 3);
}

#[tokio::test]
async fn test_unregistered_token_is_unauthenticated() {
    let fx = Fixture::new();
    fx.account("bob", AccountState::Enabled).await;
    let forged = fx
        .codec
        .encode(&TokenClaims {
            name: "bob".to_string(),
            perm: Permission::Admin,
            ext: String::new(),
            jti: "minted-elsewhere".to_string(),
            iat: NOW,
            exp: None,
        })
        .unwrap();

    assert_matches!(
        fx.verifier.verify(&meta(), &forged).await,
        Err(KeygateError::Unauthenticated { .. })
    );
}

#[tokio::test]
async fn test_foreign_secret_is_unauthenticated() {
    let fx = Fixture::new();
    fx.account("bob", AccountState::Enabled).await;
    let token = fx.issue("bob", Permission::Read).await;

    let other = TokenVerifier::new(
        fx.store.clone(),
        Arc::new(HmacTokenCodec::new(vec![1u8; 32])),
        Arc::new(fx.clock.clone()),
    );
    assert_matches!(
        other.verify(&meta(), &token).await,
        Err(KeygateError::Unauthenticated { .. })
    );
}

#[tokio::test]
async fn test_revoked_token_forbidden_until_recovered() {
    let fx = Fixture::new();
    let admin = RequestContext::local_admin();
    fx.account("bob", AccountState::Enabled).await;
    let token = fx.issue("bob", Permission::Write).await;

    fx.tokens.remove(&admin, &token).await.unwrap();
    assert_matches!(
        fx.verifier.verify(&meta(), &token).await,
        Err(KeygateError::Forbidden { .. })
    );
    assert_matches!(
        fx.tokens.remove(&admin, &token).await,
        Err(KeygateError::NotFound { .. })
    );

    fx.tokens.recover(&admin, &token).await.unwrap();
    assert!(fx.verifier.verify(&meta(), &token).await.is_ok());
    assert_matches!(
        fx.tokens.recover(&admin, &token).await,
        Err(KeygateError::InvalidArgument { .. })
    );
}

#[tokio::test]
async fn test_disabled_or_deleted_account_forbidden() {
    let fx = Fixture::new();
    fx.account("carol", AccountState::Disabled).await;
    fx.account("dave", AccountState::Enabled).await;
    let carol = fx.issue("carol", Permission::Read).await;
    let dave = fx.issue("dave", Permission::Read).await;

    assert_matches!(
        fx.verifier.verify(&meta(), &carol).await,
        Err(KeygateError::Forbidden { .. })
    );

    let delete = |a: &mut Account| -> Result<()> {
        a.deleted = true;
        Ok(())
    };
    fx.store.modify_account("dave", &delete).await.unwrap();
    assert_matches!(
        fx.verifier.verify(&meta(), &dave).await,
        Err(KeygateError::Forbidden { .. })
    );
}

#[tokio::test]
async fn test_expired_token_is_unauthenticated() {
    let fx = Fixture::with_ttl(Some(60));
    fx.account("bob", AccountState::Enabled).await;
    let token = fx.issue("bob", Permission::Read).await;

    fx.clock.advance(Duration::from_secs(59));
    assert!(fx.verifier.verify(&meta(), &token).await.is_ok());

    fx.clock.advance(Duration::from_secs(1));
    assert_matches!(
        fx.verifier.verify(&meta(), &token).await,
        Err(KeygateError::Unauthenticated { .. })
    );
}

#[tokio::test]
async fn test_generate_requires_admin_and_live_account() {
    let fx = Fixture::new();
    fx.account("bob", AccountState::Enabled).await;

    let reader = RequestContext::default().with_permissions(Permission::Read.expand());
    assert_matches!(
        fx.tokens.generate(&reader, "bob", Permission::Read, "").await,
        Err(KeygateError::Forbidden { .. })
    );
    assert_matches!(
        fx.tokens
            .generate(&RequestContext::default(), "bob", Permission::Read, "")
            .await,
        Err(KeygateError::Unauthenticated { .. })
    );
    assert_matches!(
        fx.tokens
            .generate(&RequestContext::local_admin(), "nobody", Permission::Read, "")
            .await,
        Err(KeygateError::NotFound { .. })
    );
}

#[tokio::test]
async fn test_registry_listing() {
    let fx = Fixture::new();
    let admin = RequestContext::local_admin();
    fx.account("alice", AccountState::Enabled).await;
    fx.account("bob", AccountState::Enabled).await;

    let first = fx.issue("alice", Permission::Admin).await;
    let second = fx.issue("bob", Permission::Read).await;
    let third = fx
        .tokens
        .generate(&admin, "alice", Permission::Sign, "lotus-miner")
        .await
        .unwrap();
    assert_ne!(first, third);

    let record = fx.tokens.get(&admin, &third).await.unwrap();
    assert_eq!(record.name, "alice");
    assert_eq!(record.permission, Permission::Sign);
    assert_eq!(record.extra, "lotus-miner");
    assert_eq!(record.create_time, NOW);

    fx.tokens.remove(&admin, &second).await.unwrap();
    let listed: Vec<_> = fx
        .tokens
        .list(&admin, Page::default())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.token)
        .collect();
    assert_eq!(listed, vec![first.clone(), third.clone()]);

    assert_eq!(fx.tokens.tokens_for(&admin, "alice").await.unwrap().len(), 2);
    assert!(fx.tokens.tokens_for(&admin, "bob").await.unwrap().is_empty());
    assert_matches!(
        fx.tokens.get(&admin, &second).await,
        Err(KeygateError::NotFound { .. })
    );
}
