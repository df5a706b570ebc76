//! In-memory implementation of the stores.
//!
//! Accounts live in a `DashMap` of per-account `tokio::sync::Mutex` cells.
//! A ledger transaction holds the owned guards of every account it locked and
//! stages its deltas; commit writes the staged balances through the held
//! guards, so no other task can observe one side of a transfer without the
//! other. Dropping the transaction releases the guards untouched.
//!
//! Each cell also publishes its last committed balance in an atomic, so
//! balance reads never wait behind a transaction holding the account.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{AccountStore, IdentityDirectory, LedgerTx};
use crate::{
    error::AppError,
    models::{
        account::Account,
        user::{NewUser, ProfileChanges, User},
    },
};

/// One account: the lockable row plus its committed balance.
#[derive(Debug, Clone)]
struct AccountCell {
    row: Arc<Mutex<Account>>,
    /// Written only by commit, while the row guard is held
    committed: Arc<AtomicI64>,
}

impl AccountCell {
    fn new(account: Account) -> Self {
        Self {
            committed: Arc::new(AtomicI64::new(account.balance_cents)),
            row: Arc::new(Mutex::new(account)),
        }
    }
}

/// Account Store and Identity Directory held in process memory.
///
/// Nothing survives a restart. Used when no database is configured and
/// throughout the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: Arc<DashMap<Uuid, AccountCell>>,
    users: DashMap<Uuid, User>,
    usernames: DashMap<String, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts currently stored.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_balance(&self, owner_id: Uuid) -> Result<i64, AppError> {
        self.accounts
            .get(&owner_id)
            .map(|cell| cell.committed.load(Ordering::Acquire))
            .ok_or(AppError::AccountNotFound)
    }

    async fn create_account(&self, owner_id: Uuid, initial_balance: i64) -> Result<Account, AppError> {
        if initial_balance < 0 {
            return Err(AppError::InvalidAmount);
        }

        if !self.users.contains_key(&owner_id) {
            return Err(AppError::UserNotFound);
        }

        match self.accounts.entry(owner_id) {
            Entry::Occupied(_) => Err(AppError::AccountAlreadyExists),
            Entry::Vacant(slot) => {
                let account = Account::new(owner_id, initial_balance);
                slot.insert(AccountCell::new(account.clone()));
                Ok(account)
            }
        }
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        Ok(Box::new(MemoryLedgerTx {
            accounts: Arc::clone(&self.accounts),
            locked: BTreeMap::new(),
            staged: HashMap::new(),
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct LockedAccount {
    guard: OwnedMutexGuard<Account>,
    committed: Arc<AtomicI64>,
}

struct MemoryLedgerTx {
    accounts: Arc<DashMap<Uuid, AccountCell>>,
    locked: BTreeMap<Uuid, LockedAccount>,
    staged: HashMap<Uuid, i64>,
}

impl MemoryLedgerTx {
    fn current_balance(&self, owner_id: Uuid) -> Option<i64> {
        self.staged
            .get(&owner_id)
            .copied()
            .or_else(|| self.locked.get(&owner_id).map(|held| held.guard.balance_cents))
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_account(&mut self, owner_id: Uuid) -> Result<Option<i64>, AppError> {
        if self.locked.contains_key(&owner_id) {
            return Ok(self.current_balance(owner_id));
        }

        // Clone the cell so no map shard stays locked across the await
        let Some(cell) = self.accounts.get(&owner_id).map(|cell| cell.value().clone()) else {
            return Ok(None);
        };

        let guard = cell.row.lock_owned().await;
        let balance = guard.balance_cents;
        self.locked.insert(
            owner_id,
            LockedAccount {
                guard,
                committed: cell.committed,
            },
        );

        Ok(Some(balance))
    }

    async fn apply_delta(&mut self, owner_id: Uuid, delta: i64) -> Result<i64, AppError> {
        let current = match self.current_balance(owner_id) {
            Some(balance) => balance,
            None => self
                .lock_account(owner_id)
                .await?
                .ok_or(AppError::AccountNotFound)?,
        };

        let updated = current.checked_add(delta).ok_or(AppError::InvalidAmount)?;
        if updated < 0 {
            return Err(AppError::InsufficientFunds);
        }

        self.staged.insert(owner_id, updated);
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryLedgerTx {
            mut locked, staged, ..
        } = *self;

        let now = Utc::now();
        for (owner_id, balance) in staged {
            if let Some(held) = locked.get_mut(&owner_id) {
                held.guard.balance_cents = balance;
                held.guard.updated_at = now;
                held.committed.store(balance, Ordering::Release);
            }
        }

        // Guards drop here, after every staged write is in place
        drop(locked);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn create_user(&self, user: NewUser, seed_balance: i64) -> Result<User, AppError> {
        if seed_balance < 0 {
            return Err(AppError::InvalidAmount);
        }

        // The username slot stays locked until user and account are both in place
        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(AppError::DuplicateUsername),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let created = User {
                    id: Uuid::new_v4(),
                    username: user.username,
                    password_hash: user.password_hash,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    created_at: now,
                    updated_at: now,
                };

                self.accounts
                    .insert(created.id, AccountCell::new(Account::new(created.id, seed_balance)));
                self.users.insert(created.id, created.clone());
                slot.insert(created.id);

                Ok(created)
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let Some(id) = self.usernames.get(username).map(|id| *id.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|user| user.value().clone()))
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError> {
        let mut user = self.users.get_mut(&id).ok_or(AppError::UserNotFound)?;

        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        user.updated_at = Utc::now();

        Ok(user.value().clone())
    }

    async fn search(&self, filter: &str) -> Result<Vec<User>, AppError> {
        let needle = filter.to_lowercase();

        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|entry| {
                entry.first_name.to_lowercase().contains(&needle)
                    || entry.last_name.to_lowercase().contains(&needle)
            })
            .map(|entry| entry.value().clone())
            .collect();

        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, first: &str, last: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    async fn funded(store: &MemoryStore, balance: i64) -> Uuid {
        let username = format!("owner_{}", &Uuid::new_v4().simple().to_string()[..12]);
        store
            .create_user(new_user(&username, "Owner", "Test"), balance)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_account_rejects_second_account_for_owner() {
        let store = MemoryStore::new();
        let owner = funded(&store, 100).await;

        let result = store.create_account(owner, 50).await;

        assert!(matches!(result, Err(AppError::AccountAlreadyExists)));
        assert_eq!(store.get_balance(owner).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_create_account_requires_existing_user() {
        let store = MemoryStore::new();
        let result = store.create_account(Uuid::new_v4(), 100).await;
        assert!(matches!(result, Err(AppError::UserNotFound)));
        assert_eq!(store.account_count(), 0);
    }

    #[tokio::test]
    async fn test_create_account_rejects_negative_balance() {
        let store = MemoryStore::new();
        let result = store.create_account(Uuid::new_v4(), -1).await;
        assert!(matches!(result, Err(AppError::InvalidAmount)));
        assert_eq!(store.account_count(), 0);
    }

    #[tokio::test]
    async fn test_get_balance_unknown_owner() {
        let store = MemoryStore::new();
        let result = store.get_balance(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::AccountNotFound)));
    }

    #[tokio::test]
    async fn test_get_balance_does_not_wait_for_open_transaction() {
        let store = MemoryStore::new();
        let owner = funded(&store, 100).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_account(owner).await.unwrap();
        tx.apply_delta(owner, -40).await.unwrap();

        let read = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            store.get_balance(owner),
        )
        .await;
        assert_eq!(read.unwrap().unwrap(), 100);

        tx.commit().await.unwrap();
        assert_eq!(store.get_balance(owner).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_apply_delta_visible_only_after_commit() {
        let store = MemoryStore::new();
        let owner = funded(&store, 100).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_account(owner).await.unwrap(), Some(100));
        assert_eq!(tx.apply_delta(owner, -40).await.unwrap(), 60);
        assert_eq!(tx.apply_delta(owner, 5).await.unwrap(), 65);
        tx.commit().await.unwrap();

        assert_eq!(store.get_balance(owner).await.unwrap(), 65);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_deltas() {
        let store = MemoryStore::new();
        let owner = funded(&store, 100).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.apply_delta(owner, -70).await.unwrap();
        }

        assert_eq!(store.get_balance(owner).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_apply_delta_refuses_negative_result() {
        let store = MemoryStore::new();
        let owner = funded(&store, 30).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.apply_delta(owner, -31).await;
        assert!(matches!(result, Err(AppError::InsufficientFunds)));

        // The failed delta left the staged balance untouched
        assert_eq!(tx.apply_delta(owner, -30).await.unwrap(), 0);
        tx.commit().await.unwrap();
        assert_eq!(store.get_balance(owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_apply_delta_unknown_account() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let result = tx.apply_delta(Uuid::new_v4(), 10).await;
        assert!(matches!(result, Err(AppError::AccountNotFound)));
    }

    #[tokio::test]
    async fn test_lock_is_released_on_drop() {
        let store = MemoryStore::new();
        let owner = funded(&store, 10).await;

        let mut first = store.begin().await.unwrap();
        first.lock_account(owner).await.unwrap();
        drop(first);

        let mut second = store.begin().await.unwrap();
        let locked = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            second.lock_account(owner),
        )
        .await;
        assert_eq!(locked.unwrap().unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_create_user_creates_account() {
        let store = MemoryStore::new();
        let user = store
            .create_user(new_user("alice", "Alice", "Liddell"), 500)
            .await
            .unwrap();

        assert_eq!(store.get_balance(user.id).await.unwrap(), 500);
        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_creates_no_account() {
        let store = MemoryStore::new();
        store
            .create_user(new_user("alice", "Alice", "Liddell"), 500)
            .await
            .unwrap();

        let result = store
            .create_user(new_user("alice", "Other", "Person"), 700)
            .await;

        assert!(matches!(result, Err(AppError::DuplicateUsername)));
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn test_usernames_are_case_sensitive() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice", "A", "L"), 1).await.unwrap();
        store.create_user(new_user("Alice", "A", "L"), 1).await.unwrap();
        assert_eq!(store.account_count(), 2);
    }

    #[tokio::test]
    async fn test_update_profile_keeps_unset_fields() {
        let store = MemoryStore::new();
        let user = store
            .create_user(new_user("alice", "Alice", "Liddell"), 1)
            .await
            .unwrap();

        let updated = store
            .update_profile(
                user.id,
                ProfileChanges {
                    last_name: Some("Hargreaves".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Alice");
        assert_eq!(updated.last_name, "Hargreaves");
        assert_eq!(updated.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_update_profile_unknown_user() {
        let store = MemoryStore::new();
        let result = store
            .update_profile(Uuid::new_v4(), ProfileChanges::default())
            .await;
        assert!(matches!(result, Err(AppError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_search_matches_either_name_ignoring_case() {
        let store = MemoryStore::new();
        store.create_user(new_user("carol", "Carol", "Smith"), 1).await.unwrap();
        store.create_user(new_user("bob", "Bob", "Carolsson"), 1).await.unwrap();
        store.create_user(new_user("dave", "Dave", "Jones"), 1).await.unwrap();

        let found = store.search("CAROL").await.unwrap();
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol"]);

        assert_eq!(store.search("").await.unwrap().len(), 3);
    }
}
