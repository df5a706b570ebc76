//! Transfer service - the atomic funds-transfer engine.
//!
//! This service handles:
//! - Amount and target validation
//! - Deadlock-free locking of both accounts
//! - Balance validation and symmetric deltas inside one transaction
//! - Bounded waits and retries under contention
//!
//! # Atomicity Guarantees
//!
//! Both deltas are applied inside a single store transaction and become
//! visible together on commit. Every error path aborts the transaction
//! before returning, so an error always means no balance changed.
//!
//! # Lock Ordering
//!
//! The two accounts are locked in ascending owner-id order, whichever one is
//! the source. Two transfers between the same pair in opposite directions
//! therefore queue on the same first lock instead of deadlocking.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::AppError,
    store::{AccountStore, LedgerTx},
};

/// Base delay between attempts; grows linearly with the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Outcome of a committed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from: Uuid,
    pub to: Uuid,
    pub amount: i64,
    /// Source balance after commit
    pub source_balance: i64,
    /// Destination balance after commit
    pub destination_balance: i64,
}

/// Runs transfers against an [`AccountStore`].
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct TransferCoordinator {
    accounts: Arc<dyn AccountStore>,
    attempt_timeout: Duration,
    max_retries: u32,
}

impl TransferCoordinator {
    /// # Arguments
    ///
    /// * `accounts` - Store holding the balances
    /// * `attempt_timeout` - Deadline for acquiring both locks and staging the deltas
    /// * `max_retries` - Extra attempts after a conflict before giving up
    pub fn new(accounts: Arc<dyn AccountStore>, attempt_timeout: Duration, max_retries: u32) -> Self {
        Self {
            accounts,
            attempt_timeout,
            max_retries,
        }
    }

    /// Move `amount` cents from `source` to `destination`.
    ///
    /// # Process
    ///
    /// 1. Validate amount and target
    /// 2. Open a store transaction and lock both accounts in id order
    /// 3. Check the source exists and can cover the amount
    /// 4. Check the destination exists
    /// 5. Debit source, credit destination
    /// 6. Commit (or roll back on any error)
    ///
    /// Steps 2-5 are bounded by the attempt timeout. A timed-out or
    /// conflicting attempt is rolled back and retried up to `max_retries`
    /// times.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount`: Amount is zero or negative
    /// - `InvalidTarget`: Source and destination are the same
    /// - `AccountNotFound`: Either account doesn't exist
    /// - `InsufficientFunds`: Source balance is below the amount
    /// - `ConflictRetryable`: Contention outlasted every attempt
    pub async fn transfer(
        &self,
        source: Uuid,
        destination: Uuid,
        amount: i64,
    ) -> Result<TransferReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }

        if source == destination {
            return Err(AppError::InvalidTarget);
        }

        let mut attempt = 0;
        loop {
            match self.attempt(source, destination, amount).await {
                Err(AppError::ConflictRetryable) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(%source, %destination, attempt, "transfer conflicted, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Ok(receipt) => {
                    tracing::info!(
                        %source,
                        %destination,
                        amount,
                        source_balance = receipt.source_balance,
                        "transfer committed"
                    );
                    return Ok(receipt);
                }
                Err(e) => {
                    tracing::debug!(%source, %destination, amount, error = %e, "transfer aborted");
                    return Err(e);
                }
            }
        }
    }

    /// One locked attempt.
    ///
    /// The deadline covers lock acquisition and staging only. Once commit
    /// starts it runs to completion, so a timeout can never hide a write
    /// that actually landed.
    async fn attempt(
        &self,
        source: Uuid,
        destination: Uuid,
        amount: i64,
    ) -> Result<TransferReceipt, AppError> {
        let staged = tokio::time::timeout(
            self.attempt_timeout,
            self.stage(source, destination, amount),
        )
        .await
        .map_err(|_| AppError::ConflictRetryable)??;

        let (tx, receipt) = staged;
        tx.commit().await?;

        Ok(receipt)
    }

    async fn stage(
        &self,
        source: Uuid,
        destination: Uuid,
        amount: i64,
    ) -> Result<(Box<dyn LedgerTx>, TransferReceipt), AppError> {
        let mut tx = self.accounts.begin().await?;

        let (first, second) = if source < destination {
            (source, destination)
        } else {
            (destination, source)
        };
        let first_balance = tx.lock_account(first).await?;
        let second_balance = tx.lock_account(second).await?;

        let (source_balance, destination_balance) = if first == source {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        let Some(source_balance) = source_balance else {
            tx.rollback().await?;
            return Err(AppError::AccountNotFound);
        };

        if source_balance < amount {
            tx.rollback().await?;
            return Err(AppError::InsufficientFunds);
        }

        if destination_balance.is_none() {
            tx.rollback().await?;
            return Err(AppError::AccountNotFound);
        }

        let source_after = tx.apply_delta(source, -amount).await?;
        let destination_after = tx.apply_delta(destination, amount).await?;

        Ok((
            tx,
            TransferReceipt {
                from: source,
                to: destination,
                amount,
                source_balance: source_after,
                destination_balance: destination_after,
            },
        ))
    }
}
