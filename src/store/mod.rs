//! Persistence layer: the Account Store and the Identity Directory.
//!
//! Both are expressed as traits so the same transfer and user logic runs on
//! PostgreSQL in production and on the in-memory backend in tests or when no
//! database is configured. A backend is created once at startup and shared
//! behind an `Arc`.
//!
//! # Locking Contract
//!
//! [`LedgerTx::lock_account`] takes an exclusive lock that is held until the
//! transaction commits, rolls back, or is dropped. Callers that lock more
//! than one account must do so in ascending owner-id order; the stores do not
//! reorder requests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        user::{NewUser, ProfileChanges, User},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Balance storage keyed by owner identity.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Current balance of the account owned by `owner_id`.
    ///
    /// Takes no transaction-scoped lock; the value may be superseded by a
    /// transfer committing right after it is read.
    async fn get_balance(&self, owner_id: Uuid) -> Result<i64, AppError>;

    /// Create the single account for `owner_id`.
    ///
    /// Fails with `AccountAlreadyExists` if the owner already has one,
    /// `UserNotFound` if no user owns `owner_id`, and `InvalidAmount` if
    /// `initial_balance` is negative.
    async fn create_account(&self, owner_id: Uuid, initial_balance: i64) -> Result<Account, AppError>;

    /// Open a transaction in which accounts can be locked and mutated.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError>;

    /// Verify the backing store is reachable.
    async fn ping(&self) -> Result<(), AppError>;

    /// Short backend name for health output.
    fn backend(&self) -> &'static str;
}

/// A unit of work over locked accounts.
///
/// Deltas applied inside the transaction become visible together on
/// [`commit`](LedgerTx::commit). Dropping the transaction without committing
/// discards them and releases every lock.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the account owned by `owner_id` and return its balance, or `None`
    /// if no such account exists.
    async fn lock_account(&mut self, owner_id: Uuid) -> Result<Option<i64>, AppError>;

    /// Atomically add `delta` to the balance and return the new balance.
    ///
    /// Fails with `InsufficientFunds` if the result would be negative and
    /// `AccountNotFound` if the account does not exist.
    async fn apply_delta(&mut self, owner_id: Uuid, delta: i64) -> Result<i64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// User records keyed by id and username.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Insert a user together with its account as one atomic unit.
    ///
    /// Fails with `DuplicateUsername` if the username is taken, in which case
    /// no account is created either.
    async fn create_user(&self, user: NewUser, seed_balance: i64) -> Result<User, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Apply a partial update; fails with `UserNotFound` if `id` is unknown.
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError>;

    /// Users whose first or last name contains `filter`, ignoring case.
    ///
    /// An empty filter matches everyone. Results are ordered by username.
    async fn search(&self, filter: &str) -> Result<Vec<User>, AppError>;
}
