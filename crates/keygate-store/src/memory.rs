//! In-memory record store
//!
//! One `RwLock` per table, so token verification (reads of tokens and
//! accounts) never queues behind rule or token writes. The account table
//! owns the miner index and updates it inside the same write section as the
//! record itself.

use crate::traits::{AccountMutation, AccountStore, RateLimitStore, RuleInsert, TokenStore};
use async_trait::async_trait;
use keygate_core::{
    Account, AccountQuery, KeygateError, Page, RateLimitRule, Result, TokenRecord,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct AccountTable {
    accounts: BTreeMap<String, Account>,
    miners: HashMap<String, String>,
}

impl AccountTable {
    fn ensure_miner_free(&self, miner: &str, owner: &str) -> Result<()> {
        match self.miners.get(miner) {
            Some(bound) if bound != owner => Err(KeygateError::miner_bound(format!(
                "miner {miner} is bound to {bound}"
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct TokenTable {
    records: HashMap<String, TokenRecord>,
    issue_order: Vec<String>,
}

impl TokenTable {
    fn live(&self) -> impl Iterator<Item = &TokenRecord> {
        self.issue_order
            .iter()
            .filter_map(|token| self.records.get(token))
            .filter(|record| !record.deleted)
    }
}

type RuleKey = (String, String);

/// In-memory store for tests and single-process deployments
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    accounts: Arc<RwLock<AccountTable>>,
    rules: Arc<RwLock<BTreeMap<RuleKey, RateLimitRule>>>,
    tokens: Arc<RwLock<TokenTable>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<()> {
        let mut table = self.accounts.write().await;
        if table.accounts.contains_key(&account.name) {
            return Err(KeygateError::already_exists(format!(
                "account {} already exists",
                account.name
            )));
        }
        if let Some(miner) = &account.miner {
            table.ensure_miner_free(miner, &account.name)?;
            table.miners.insert(miner.clone(), account.name.clone());
        }
        table.accounts.insert(account.name.clone(), account);
        Ok(())
    }

    async fn modify_account(&self, name: &str, mutation: AccountMutation<'_>) -> Result<Account> {
        let mut table = self.accounts.write().await;
        let current = table
            .accounts
            .get(name)
            .cloned()
            .ok_or_else(|| KeygateError::not_found(format!("account {name} not found")))?;

        let mut next = current.clone();
        mutation(&mut next)?;
        if next.name != current.name {
            return Err(KeygateError::internal("account name is immutable"));
        }

        if next.miner != current.miner {
            if let Some(miner) = &next.miner {
                table.ensure_miner_free(miner, name)?;
            }
            if let Some(old) = &current.miner {
                table.miners.remove(old);
            }
            if let Some(miner) = &next.miner {
                table.miners.insert(miner.clone(), name.to_string());
            }
        }

        table.accounts.insert(name.to_string(), next.clone());
        Ok(next)
    }

    async fn get_account(&self, name: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.accounts.get(name).cloned())
    }

    async fn account_by_miner(&self, miner: &str) -> Result<Option<Account>> {
        let table = self.accounts.read().await;
        Ok(table
            .miners
            .get(miner)
            .and_then(|owner| table.accounts.get(owner))
            .cloned())
    }

    async fn list_accounts(&self, query: &AccountQuery, page: Page) -> Result<Vec<Account>> {
        let table = self.accounts.read().await;
        Ok(page.slice(
            table
                .accounts
                .values()
                .filter(|account| !account.deleted && query.matches(account))
                .cloned(),
        ))
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn insert_rule(&self, rule: RateLimitRule, mode: RuleInsert) -> Result<()> {
        let mut rules = self.rules.write().await;
        let key = (rule.account.clone(), rule.id.clone());
        let conflict = match mode {
            RuleInsert::Exclusive => rules.keys().any(|(account, _)| *account == rule.account),
            RuleInsert::Keyed => rules.contains_key(&key),
        };
        if conflict {
            return Err(KeygateError::already_exists(format!(
                "rate limit for {} already exists",
                rule.account
            )));
        }
        rules.insert(key, rule);
        Ok(())
    }

    async fn update_rule(&self, rule: RateLimitRule) -> Result<()> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&(rule.account.clone(), rule.id.clone())) {
            Some(existing) => {
                *existing = rule;
                Ok(())
            }
            None => Err(KeygateError::not_found(format!(
                "rate limit {} of {} not found",
                rule.id, rule.account
            ))),
        }
    }

    async fn get_rule(&self, account: &str, id: &str) -> Result<Option<RateLimitRule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .get(&(account.to_string(), id.to_string()))
            .cloned())
    }

    async fn rules_for(&self, account: &str) -> Result<Vec<RateLimitRule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .range((account.to_string(), String::new())..)
            .take_while(|((owner, _), _)| owner == account)
            .map(|(_, rule)| rule.clone())
            .collect())
    }

    async fn delete_rule(&self, account: &str, id: &str) -> Result<bool> {
        let mut rules = self.rules.write().await;
        Ok(rules
            .remove(&(account.to_string(), id.to_string()))
            .is_some())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, record: TokenRecord) -> Result<()> {
        let mut table = self.tokens.write().await;
        if table.records.contains_key(&record.token) {
            return Err(KeygateError::already_exists(format!(
                "token for {} already registered",
                record.name
            )));
        }
        table.issue_order.push(record.token.clone());
        table.records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<TokenRecord>> {
        Ok(self.tokens.read().await.records.get(token).cloned())
    }

    async fn list_tokens(&self, page: Page) -> Result<Vec<TokenRecord>> {
        let table = self.tokens.read().await;
        Ok(page.slice(table.live().cloned()))
    }

    async fn tokens_for(&self, name: &str) -> Result<Vec<TokenRecord>> {
        let table = self.tokens.read().await;
        Ok(table
            .live()
            .filter(|record| record.name == name)
            .cloned()
            .collect())
    }

    async fn set_token_deleted(&self, token: &str, deleted: bool) -> Result<bool> {
        let mut table = self.tokens.write().await;
        let record = table
            .records
            .get_mut(token)
            .ok_or_else(|| KeygateError::not_found("token not found"))?;
        let previous = record.deleted;
        record.deleted = deleted;
        Ok(previous)
    }
}
