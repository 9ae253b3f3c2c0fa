//! Account records, the reward-pool state machine, and the partial-update
//! protocol used to mutate them.
//!
//! An [`Account`] is only ever changed through an [`AccountPatch`]: fields
//! whose bit is absent from the patch mask are left alone no matter what the
//! request payload carries, so "set to zero" and "leave unset" stay distinct.

use crate::mask::{FieldMask, MaskField};
use crate::page::Page;
use crate::{KeygateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `source_type` tag for accounts created on behalf of a miner
pub const SOURCE_TYPE_MINER: i32 = 1;

/// Whether an account may authenticate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum AccountState {
    /// Tokens for the account are refused
    #[default]
    Disabled = 0,
    /// Tokens for the account are accepted
    Enabled = 1,
}

impl TryFrom<i32> for AccountState {
    type Error = KeygateError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(AccountState::Disabled),
            1 => Ok(AccountState::Enabled),
            other => Err(KeygateError::invalid_argument(format!(
                "unexpected account state: {other}, expected 0 (disabled) or 1 (enabled)"
            ))),
        }
    }
}

impl From<AccountState> for i32 {
    fn from(state: AccountState) -> Self {
        state as i32
    }
}

/// Reward-pool membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum RewardPoolState {
    /// Never joined
    #[default]
    NotJoined = 0,
    /// Currently a member
    Joined = 1,
    /// Left after having joined
    Exited = 2,
}

impl TryFrom<i32> for RewardPoolState {
    type Error = KeygateError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(RewardPoolState::NotJoined),
            1 => Ok(RewardPoolState::Joined),
            2 => Ok(RewardPoolState::Exited),
            other => Err(KeygateError::invalid_argument(format!(
                "unexpected reward pool state: {other}, expected 0 (not joined), 1 (joined) or 2 (exited)"
            ))),
        }
    }
}

impl From<RewardPoolState> for i32 {
    fn from(state: RewardPoolState) -> Self {
        state as i32
    }
}

impl fmt::Display for RewardPoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RewardPoolState::NotJoined => "not joined",
            RewardPoolState::Joined => "joined",
            RewardPoolState::Exited => "exited",
        })
    }
}

/// Identity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique name, the primary key
    pub name: String,
    /// Bound miner identifier
    pub miner: Option<String>,
    /// Free-text comment
    pub comment: String,
    /// Provenance tag
    pub source_type: i32,
    /// Enabled/disabled
    pub state: AccountState,
    /// Reward-pool membership
    pub reward_pool_state: RewardPoolState,
    /// Set once the account has joined the reward pool
    pub join_reward_pool_time: Option<u64>,
    /// Set once the account has exited the reward pool
    pub exit_reward_pool_time: Option<u64>,
    /// Creation time (Unix seconds)
    pub create_time: u64,
    /// Last mutation time (Unix seconds)
    pub update_time: u64,
    /// Soft-delete marker
    pub deleted: bool,
}

impl Account {
    /// Build a new record from a creation request.
    ///
    /// The request may start the account inside the reward pool, which
    /// requires a miner; starting as `Exited` is rejected.
    pub fn from_create(request: &CreateAccount, now: u64) -> Result<Self> {
        if request.name.trim().is_empty() {
            return Err(KeygateError::invalid_argument("account name is empty"));
        }

        let mut account = Self {
            name: request.name.clone(),
            miner: normalize_miner(request.miner.as_deref()),
            comment: request.comment.clone(),
            source_type: request.source_type,
            state: request.state,
            reward_pool_state: RewardPoolState::NotJoined,
            join_reward_pool_time: None,
            exit_reward_pool_time: None,
            create_time: now,
            update_time: now,
            deleted: false,
        };

        match request.reward_pool_state {
            RewardPoolState::NotJoined => {}
            RewardPoolState::Joined => account.join_reward_pool(now)?,
            RewardPoolState::Exited => {
                return Err(KeygateError::invalid_transition(
                    "a new account cannot start as exited from the reward pool",
                ))
            }
        }

        Ok(account)
    }

    /// `NotJoined → Joined`, stamping the join time
    pub fn join_reward_pool(&mut self, at: u64) -> Result<()> {
        if self.miner.is_none() {
            return Err(KeygateError::invalid_transition(format!(
                "{} has no bound miner and cannot join the reward pool",
                self.name
            )));
        }
        match self.reward_pool_state {
            RewardPoolState::NotJoined => {
                self.reward_pool_state = RewardPoolState::Joined;
                self.join_reward_pool_time = Some(at);
                Ok(())
            }
            current => Err(KeygateError::invalid_transition(format!(
                "{} cannot join the reward pool: already {current}",
                self.name
            ))),
        }
    }

    /// `Joined → Exited`, stamping the exit time
    pub fn exit_reward_pool(&mut self, at: u64) -> Result<()> {
        match self.reward_pool_state {
            RewardPoolState::Joined => {
                self.reward_pool_state = RewardPoolState::Exited;
                self.exit_reward_pool_time = Some(at);
                Ok(())
            }
            current => Err(KeygateError::invalid_transition(format!(
                "{} cannot exit the reward pool: {current}",
                self.name
            ))),
        }
    }

    /// Apply a sparse patch.
    ///
    /// Only flagged fields are written. The patch is validated as a whole
    /// before anything is committed, so a rejected patch leaves the record
    /// untouched. An empty mask is a no-op, `update_time` included.
    pub fn apply_patch(&mut self, patch: &AccountPatch, now: u64) -> Result<()> {
        if patch.fields.is_empty() {
            return Ok(());
        }

        let joining = patch.fields.contains(AccountField::RewardPoolState)
            && patch.reward_pool_state == RewardPoolState::Joined;
        if patch.fields.contains(AccountField::JoinRewardPoolTime) && !joining {
            return Err(KeygateError::invalid_argument(
                "joinRewardPoolTime may only be supplied when joining the reward pool",
            ));
        }

        let mut next = self.clone();
        for field in patch.fields.iter() {
            match field {
                AccountField::Miner => next.miner = normalize_miner(Some(&patch.miner)),
                AccountField::Comment => next.comment.clone_from(&patch.comment),
                AccountField::State => next.state = patch.state,
                AccountField::SourceType => next.source_type = patch.source_type,
                // Applied below, after the miner binding is settled.
                AccountField::RewardPoolState | AccountField::JoinRewardPoolTime => {}
            }
        }

        if patch.fields.contains(AccountField::RewardPoolState) {
            match patch.reward_pool_state {
                RewardPoolState::Joined => {
                    let at = if patch.fields.contains(AccountField::JoinRewardPoolTime) {
                        patch.join_reward_pool_time
                    } else {
                        now
                    };
                    next.join_reward_pool(at)?;
                }
                RewardPoolState::Exited => next.exit_reward_pool(now)?,
                RewardPoolState::NotJoined => {
                    return Err(KeygateError::invalid_transition(format!(
                        "{} cannot move back to not joined from {}",
                        self.name, self.reward_pool_state
                    )))
                }
            }
        }

        next.update_time = now;
        *self = next;
        Ok(())
    }
}

fn normalize_miner(miner: Option<&str>) -> Option<String> {
    miner
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Request to create an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    /// Unique account name
    pub name: String,
    /// Miner to bind, if any
    pub miner: Option<String>,
    /// Free-text comment
    #[serde(default)]
    pub comment: String,
    /// Provenance tag
    #[serde(default)]
    pub source_type: i32,
    /// Initial state
    #[serde(default)]
    pub state: AccountState,
    /// Initial reward-pool state
    #[serde(default)]
    pub reward_pool_state: RewardPoolState,
}

impl CreateAccount {
    /// Request for a disabled, unbound account outside the reward pool
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Bind a miner on creation
    pub fn with_miner(mut self, miner: impl Into<String>) -> Self {
        self.miner = Some(miner.into());
        self
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Set the provenance tag
    pub fn with_source_type(mut self, source_type: i32) -> Self {
        self.source_type = source_type;
        self
    }

    /// Set the initial state
    pub fn with_state(mut self, state: AccountState) -> Self {
        self.state = state;
        self
    }

    /// Set the initial reward-pool state
    pub fn with_reward_pool_state(mut self, state: RewardPoolState) -> Self {
        self.reward_pool_state = state;
        self
    }
}

/// Mutable account fields, in wire bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountField {
    /// Bound miner
    Miner,
    /// Comment
    Comment,
    /// Enabled/disabled
    State,
    /// Provenance tag
    SourceType,
    /// Reward-pool membership
    RewardPoolState,
    /// Caller-supplied join time
    JoinRewardPoolTime,
}

impl MaskField for AccountField {
    const ALL: &'static [Self] = &[
        AccountField::Miner,
        AccountField::Comment,
        AccountField::State,
        AccountField::SourceType,
        AccountField::RewardPoolState,
        AccountField::JoinRewardPoolTime,
    ];

    fn bit(self) -> u32 {
        match self {
            AccountField::Miner => 1,
            AccountField::Comment => 2,
            AccountField::State => 4,
            AccountField::SourceType => 8,
            AccountField::RewardPoolState => 16,
            AccountField::JoinRewardPoolTime => 32,
        }
    }
}

/// Sparse account update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    miner: String,
    comment: String,
    state: AccountState,
    source_type: i32,
    reward_pool_state: RewardPoolState,
    join_reward_pool_time: u64,
    fields: FieldMask<AccountField>,
}

impl AccountPatch {
    /// Patch that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bound miner; an empty value unbinds
    pub fn miner(mut self, miner: impl Into<String>) -> Self {
        self.miner = miner.into();
        self.fields.insert(AccountField::Miner);
        self
    }

    /// Set the comment
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self.fields.insert(AccountField::Comment);
        self
    }

    /// Set the state
    pub fn state(mut self, state: AccountState) -> Self {
        self.state = state;
        self.fields.insert(AccountField::State);
        self
    }

    /// Set the provenance tag
    pub fn source_type(mut self, source_type: i32) -> Self {
        self.source_type = source_type;
        self.fields.insert(AccountField::SourceType);
        self
    }

    /// Request a reward-pool transition
    pub fn reward_pool_state(mut self, state: RewardPoolState) -> Self {
        self.reward_pool_state = state;
        self.fields.insert(AccountField::RewardPoolState);
        self
    }

    /// Supply the join time for a join in the same patch
    pub fn join_reward_pool_time(mut self, at: u64) -> Self {
        self.join_reward_pool_time = at;
        self.fields.insert(AccountField::JoinRewardPoolTime);
        self
    }

    /// Flagged fields
    pub fn fields(&self) -> &FieldMask<AccountField> {
        &self.fields
    }

    /// The miner binding this patch introduces, if it sets a non-empty miner
    pub fn new_miner(&self) -> Option<&str> {
        if !self.fields.contains(AccountField::Miner) {
            return None;
        }
        let miner = self.miner.trim();
        (!miner.is_empty()).then_some(miner)
    }
}

/// Wire form of an account update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    /// Target account
    pub name: String,
    /// Miner value (bit 1)
    pub miner: String,
    /// Comment value (bit 2)
    pub comment: String,
    /// State value (bit 4)
    pub state: i32,
    /// Source type value (bit 8)
    pub source_type: i32,
    /// Reward-pool state value (bit 16)
    pub reward_pool_state: i32,
    /// Join time value (bit 32)
    pub join_reward_pool_time: u64,
    /// Field-presence bitmask
    pub key_sum: u32,
}

impl UpdateAccountRequest {
    /// Decode into a typed patch.
    ///
    /// Values of fields whose bit is clear are ignored, even when they would
    /// not parse.
    pub fn to_patch(&self) -> Result<AccountPatch> {
        let fields = FieldMask::<AccountField>::from_bits(self.key_sum)?;
        let mut patch = AccountPatch::new();
        for field in fields.iter() {
            patch = match field {
                AccountField::Miner => patch.miner(self.miner.clone()),
                AccountField::Comment => patch.comment(self.comment.clone()),
                AccountField::State => patch.state(AccountState::try_from(self.state)?),
                AccountField::SourceType => patch.source_type(self.source_type),
                AccountField::RewardPoolState => {
                    patch.reward_pool_state(RewardPoolState::try_from(self.reward_pool_state)?)
                }
                AccountField::JoinRewardPoolTime => {
                    patch.join_reward_pool_time(self.join_reward_pool_time)
                }
            };
        }
        Ok(patch)
    }

    /// Encode a typed patch for `name`
    pub fn from_patch(name: impl Into<String>, patch: &AccountPatch) -> Self {
        Self {
            name: name.into(),
            miner: patch.miner.clone(),
            comment: patch.comment.clone(),
            state: patch.state.into(),
            source_type: patch.source_type,
            reward_pool_state: patch.reward_pool_state.into(),
            join_reward_pool_time: patch.join_reward_pool_time,
            key_sum: patch.fields.to_bits(),
        }
    }
}

/// Account list predicates, in wire bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryField {
    /// Filter on `source_type`
    SourceType,
    /// Filter on `state`
    State,
    /// Filter on `reward_pool_state`
    RewardPoolState,
}

impl MaskField for QueryField {
    const ALL: &'static [Self] = &[
        QueryField::SourceType,
        QueryField::State,
        QueryField::RewardPoolState,
    ];

    fn bit(self) -> u32 {
        match self {
            QueryField::SourceType => 1,
            QueryField::State => 2,
            QueryField::RewardPoolState => 4,
        }
    }
}

/// Filtered, paginated account listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountQuery {
    /// Pagination
    pub page: Page,
    source_type: i32,
    state: AccountState,
    reward_pool_state: RewardPoolState,
    fields: FieldMask<QueryField>,
}

impl AccountQuery {
    /// Unfiltered query over `page`
    pub fn new(page: Page) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Only accounts with this provenance tag
    pub fn with_source_type(mut self, source_type: i32) -> Self {
        self.source_type = source_type;
        self.fields.insert(QueryField::SourceType);
        self
    }

    /// Only accounts in this state
    pub fn with_state(mut self, state: AccountState) -> Self {
        self.state = state;
        self.fields.insert(QueryField::State);
        self
    }

    /// Only accounts in this reward-pool state
    pub fn with_reward_pool_state(mut self, state: RewardPoolState) -> Self {
        self.reward_pool_state = state;
        self.fields.insert(QueryField::RewardPoolState);
        self
    }

    /// Active predicates
    pub fn fields(&self) -> &FieldMask<QueryField> {
        &self.fields
    }

    /// Whether `account` passes every active predicate
    pub fn matches(&self, account: &Account) -> bool {
        self.fields.iter().all(|field| match field {
            QueryField::SourceType => account.source_type == self.source_type,
            QueryField::State => account.state == self.state,
            QueryField::RewardPoolState => account.reward_pool_state == self.reward_pool_state,
        })
    }
}

/// Wire form of an account listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListAccountsRequest {
    /// Records to skip
    pub skip: u64,
    /// Maximum records to return
    pub limit: u64,
    /// Source type value (bit 1)
    pub source_type: i32,
    /// State value (bit 2)
    pub state: i32,
    /// Reward-pool state value (bit 4)
    pub reward_pool_state: i32,
    /// Predicate-presence bitmask
    pub key_sum: u32,
}

impl ListAccountsRequest {
    /// Decode into a typed query
    pub fn to_query(&self) -> Result<AccountQuery> {
        let fields = FieldMask::<QueryField>::from_bits(self.key_sum)?;
        let mut query = AccountQuery::new(Page::new(self.skip, self.limit));
        for field in fields.iter() {
            query = match field {
                QueryField::SourceType => query.with_source_type(self.source_type),
                QueryField::State => query.with_state(AccountState::try_from(self.state)?),
                QueryField::RewardPoolState => query
                    .with_reward_pool_state(RewardPoolState::try_from(self.reward_pool_state)?),
            };
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn account() -> Account {
        Account::from_create(
            &CreateAccount::new("alice")
                .with_miner("f01000")
                .with_comment("seed")
                .with_source_type(SOURCE_TYPE_MINER)
                .with_state(AccountState::Enabled),
            100,
        )
        .unwrap()
    }

    #[test]
    fn test_create_defaults() {
        let account = Account::from_create(&CreateAccount::new("bob"), 7).unwrap();
        assert_eq!(account.miner, None);
        assert_eq!(account.state, AccountState::Disabled);
        assert_eq!(account.reward_pool_state, RewardPoolState::NotJoined);
        assert_eq!(account.create_time, 7);
        assert_eq!(account.join_reward_pool_time, None);
    }

    #[test]
    fn test_create_rejects_empty_name_and_exited() {
        assert_matches!(
            Account::from_create(&CreateAccount::new("  "), 0),
            Err(KeygateError::InvalidArgument { .. })
        );
        assert_matches!(
            Account::from_create(
                &CreateAccount::new("bob").with_reward_pool_state(RewardPoolState::Exited),
                0
            ),
            Err(KeygateError::InvalidTransition { .. })
        );
    }

    #[test]
    fn test_create_joined_requires_miner() {
        assert_matches!(
            Account::from_create(
                &CreateAccount::new("bob").with_reward_pool_state(RewardPoolState::Joined),
                0
            ),
            Err(KeygateError::InvalidTransition { .. })
        );

        let joined = Account::from_create(
            &CreateAccount::new("bob")
                .with_miner("f02000")
                .with_reward_pool_state(RewardPoolState::Joined),
            9,
        )
        .unwrap();
        assert_eq!(joined.join_reward_pool_time, Some(9));
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut target = account();
        let before = target.clone();
        target.apply_patch(&AccountPatch::new(), 500).unwrap();
        assert_eq!(target, before);
    }

    #[test]
    fn test_zero_state_is_applied() {
        let mut target = account();
        let request = UpdateAccountRequest {
            name: "alice".into(),
            miner: "garbage".into(),
            comment: "garbage".into(),
            state: 0,
            source_type: 99,
            reward_pool_state: 7,
            join_reward_pool_time: 12345,
            key_sum: 4,
        };
        target.apply_patch(&request.to_patch().unwrap(), 200).unwrap();

        assert_eq!(target.state, AccountState::Disabled);
        assert_eq!(target.miner.as_deref(), Some("f01000"));
        assert_eq!(target.comment, "seed");
        assert_eq!(target.source_type, SOURCE_TYPE_MINER);
        assert_eq!(target.update_time, 200);
    }

    #[test]
    fn test_empty_miner_unbinds() {
        let mut target = account();
        target.apply_patch(&AccountPatch::new().miner(""), 1).unwrap();
        assert_eq!(target.miner, None);
    }

    #[test]
    fn test_join_rules() {
        let mut unbound = Account::from_create(&CreateAccount::new("carol"), 0).unwrap();
        let join = AccountPatch::new().reward_pool_state(RewardPoolState::Joined);
        assert_matches!(
            unbound.apply_patch(&join, 5),
            Err(KeygateError::InvalidTransition { .. })
        );

        let mut target = account();
        target.apply_patch(&join, 5).unwrap();
        assert_eq!(target.reward_pool_state, RewardPoolState::Joined);
        assert_eq!(target.join_reward_pool_time, Some(5));
        assert_eq!(target.exit_reward_pool_time, None);

        assert_matches!(
            target.apply_patch(&join, 6),
            Err(KeygateError::InvalidTransition { .. })
        );
        assert_eq!(target.join_reward_pool_time, Some(5));
    }

    #[test]
    fn test_bind_and_join_in_one_patch() {
        let mut target = Account::from_create(&CreateAccount::new("carol"), 0).unwrap();
        let patch = AccountPatch::new()
            .miner("f03000")
            .reward_pool_state(RewardPoolState::Joined)
            .join_reward_pool_time(42);
        target.apply_patch(&patch, 50).unwrap();
        assert_eq!(target.join_reward_pool_time, Some(42));
        assert_eq!(target.update_time, 50);
    }

    #[test]
    fn test_exit_rules() {
        let mut target = account();
        let exit = AccountPatch::new().reward_pool_state(RewardPoolState::Exited);
        assert_matches!(
            target.apply_patch(&exit, 5),
            Err(KeygateError::InvalidTransition { .. })
        );

        target.join_reward_pool(5).unwrap();
        target.apply_patch(&exit, 8).unwrap();
        assert_eq!(target.reward_pool_state, RewardPoolState::Exited);
        assert_eq!(target.exit_reward_pool_time, Some(8));

        let rejoin = AccountPatch::new().reward_pool_state(RewardPoolState::Joined);
        assert_matches!(
            target.apply_patch(&rejoin, 9),
            Err(KeygateError::InvalidTransition { .. })
        );
    }

    #[test]
    fn test_join_time_without_join_rejected() {
        let mut target = account();
        let before = target.clone();
        let patch = AccountPatch::new().comment("x").join_reward_pool_time(3);
        assert_matches!(
            target.apply_patch(&patch, 4),
            Err(KeygateError::InvalidArgument { .. })
        );
        assert_eq!(target, before);
    }

    #[test]
    fn test_wire_round_trip_keeps_mask() {
        let patch = AccountPatch::new().comment("").source_type(0);
        let wire = UpdateAccountRequest::from_patch("alice", &patch);
        assert_eq!(wire.key_sum, 2 | 8);
        assert_eq!(wire.to_patch().unwrap(), patch);
    }

    #[test]
    fn test_query_matches_active_predicates_only() {
        let target = account();
        let request = ListAccountsRequest {
            skip: 0,
            limit: 10,
            source_type: SOURCE_TYPE_MINER,
            state: 0,
            reward_pool_state: 9,
            key_sum: 1,
        };
        let query = request.to_query().unwrap();
        assert!(query.matches(&target));
        assert!(!query.with_state(AccountState::Disabled).matches(&target));
    }

    proptest! {
        #[test]
        fn unset_fields_survive_any_payload(
            miner in any::<u16>(),
            comment in any::<u16>(),
            state in any::<i32>(),
            source_type in any::<i32>(),
            pool in any::<i32>(),
            join_time in any::<u64>(),
        ) {
            let mut target = account();
            let before = target.clone();
            let request = UpdateAccountRequest {
                name: "alice".into(),
                miner: format!("f0{miner}"),
                comment: format!("c{comment}"),
                state,
                source_type,
                reward_pool_state: pool,
                join_reward_pool_time: join_time,
                key_sum: 0,
            };
            target.apply_patch(&request.to_patch().unwrap(), 999).unwrap();
            prop_assert_eq!(target, before);
        }
    }
}
