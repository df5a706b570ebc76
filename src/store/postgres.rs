//! PostgreSQL implementation of the stores.
//!
//! # Atomicity Guarantees
//!
//! All balance updates happen within PostgreSQL transactions. Row locks are
//! taken with `SELECT ... FOR UPDATE`, bounded by a transaction-local
//! `lock_timeout`. Debits use a conditional `UPDATE` so the non-negative
//! check and the write are a single statement.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use super::{AccountStore, IdentityDirectory, LedgerTx};
use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::Account,
        user::{NewUser, ProfileChanges, User},
    },
};

/// SQLSTATE codes that mean "nothing was written, try again":
/// serialization_failure, deadlock_detected, lock_not_available.
const RETRYABLE_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

/// numeric_value_out_of_range: a balance left the BIGINT range.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

const USERNAME_CONSTRAINT: &str = "users_username_key";
const ACCOUNT_OWNER_CONSTRAINT: &str = "accounts_user_id_key";
const ACCOUNT_USER_FK: &str = "accounts_user_id_fkey";

const USER_COLUMNS: &str = "id, username, password_hash, first_name, last_name, created_at, updated_at";
const ACCOUNT_COLUMNS: &str = "id, user_id, balance_cents, created_at, updated_at";

/// Map a sqlx error onto the application taxonomy.
///
/// Lock timeouts and serialization failures become `ConflictRetryable`;
/// balance overflow becomes `InvalidAmount`; constraint violations on known
/// constraints become their domain errors.
fn classify(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if let Some(code) = db_err.code() {
            if RETRYABLE_SQLSTATES.contains(&&*code) {
                return AppError::ConflictRetryable;
            }
            if code == NUMERIC_OUT_OF_RANGE {
                return AppError::InvalidAmount;
            }
        }
        if db_err.is_foreign_key_violation() && db_err.constraint() == Some(ACCOUNT_USER_FK) {
            return AppError::UserNotFound;
        }
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(USERNAME_CONSTRAINT) => return AppError::DuplicateUsername,
                Some(ACCOUNT_OWNER_CONSTRAINT) => return AppError::AccountAlreadyExists,
                _ => {}
            }
        }
    }
    AppError::Database(err)
}

/// Account Store and Identity Directory backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Insert an account row inside an open transaction.
async fn insert_account(
    tx: &mut Transaction<'static, Postgres>,
    owner_id: Uuid,
    initial_balance: i64,
) -> Result<Account, AppError> {
    if initial_balance < 0 {
        return Err(AppError::InvalidAmount);
    }

    sqlx::query_as::<_, Account>(&format!(
        "INSERT INTO accounts (user_id, balance_cents) VALUES ($1, $2) RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(initial_balance)
    .fetch_one(&mut **tx)
    .await
    .map_err(classify)
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get_balance(&self, owner_id: Uuid) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT balance_cents FROM accounts WHERE user_id = $1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::AccountNotFound)
    }

    async fn create_account(&self, owner_id: Uuid, initial_balance: i64) -> Result<Account, AppError> {
        let mut tx = self.pool.begin().await?;
        let account = insert_account(&mut tx, owner_id, initial_balance).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // Bound every row-lock wait in this transaction; expiry raises 55P03
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// An open PostgreSQL transaction.
///
/// Dropping it without `commit` rolls the transaction back.
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_account(&mut self, owner_id: Uuid) -> Result<Option<i64>, AppError> {
        // FOR UPDATE holds the row until commit or rollback
        sqlx::query_scalar("SELECT balance_cents FROM accounts WHERE user_id = $1 FOR UPDATE")
            .bind(owner_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn apply_delta(&mut self, owner_id: Uuid, delta: i64) -> Result<i64, AppError> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + $1,
                updated_at = NOW()
            WHERE user_id = $2 AND balance_cents + $1 >= 0
            RETURNING balance_cents
            "#,
        )
        .bind(delta)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        if let Some(balance) = updated {
            return Ok(balance);
        }

        // No row updated: either the account is missing or the guard failed
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE user_id = $1)")
                .bind(owner_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(classify)?;

        if exists {
            Err(AppError::InsufficientFunds)
        } else {
            Err(AppError::AccountNotFound)
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await.map_err(classify)
    }
}

#[async_trait]
impl IdentityDirectory for PgStore {
    async fn create_user(&self, user: NewUser, seed_balance: i64) -> Result<User, AppError> {
        // User and account commit together or not at all
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        insert_account(&mut tx, created.id, seed_balance).await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError> {
        // COALESCE keeps the current value for fields left as NULL
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET password_hash = COALESCE($2, password_hash),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.password_hash)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::UserNotFound)
    }

    async fn search(&self, filter: &str) -> Result<Vec<User>, AppError> {
        let pattern = format!("%{}%", escape_like(filter));

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE first_name ILIKE $1 ESCAPE '\' OR last_name ILIKE $1 ESCAPE '\'
            ORDER BY username
            "#
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

/// Escape LIKE metacharacters so the filter matches literally.
fn escape_like(filter: &str) -> String {
    let mut escaped = String::with_capacity(filter.len());
    for c in filter.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[test]
    fn test_escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("ali"), "ali");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_classify_passes_through_non_database_errors() {
        assert!(matches!(classify(sqlx::Error::RowNotFound), AppError::Database(_)));
    }

    #[derive(Debug)]
    struct StubDbError {
        code: &'static str,
        constraint: Option<&'static str>,
    }

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "stub database error {}", self.code)
        }
    }

    impl std::error::Error for StubDbError {}

    impl DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "stub"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23505" => ErrorKind::UniqueViolation,
                "23503" => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn db_error(code: &'static str, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(StubDbError { code, constraint }))
    }

    #[rstest]
    #[case::serialization_failure("40001", None, "conflict_retryable")]
    #[case::deadlock("40P01", None, "conflict_retryable")]
    #[case::lock_timeout("55P03", None, "conflict_retryable")]
    #[case::balance_overflow("22003", None, "invalid_amount")]
    #[case::duplicate_username("23505", Some(USERNAME_CONSTRAINT), "duplicate_username")]
    #[case::second_account("23505", Some(ACCOUNT_OWNER_CONSTRAINT), "account_already_exists")]
    #[case::account_without_user("23503", Some(ACCOUNT_USER_FK), "user_not_found")]
    #[case::unknown_constraint("23505", Some("other_key"), "internal_error")]
    #[case::unrelated("42P01", None, "internal_error")]
    fn test_classify_database_errors(
        #[case] code: &'static str,
        #[case] constraint: Option<&'static str>,
        #[case] expected: &str,
    ) {
        assert_eq!(classify(db_error(code, constraint)).code(), expected);
    }
}
