//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Database entity holding a user's balance
//! - `TransferRequest`: Request body for moving funds
//! - `BalanceResponse` / `TransferResponse`: Response bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::Validate;
use crate::error::AppError;

/// Represents an account record from the database.
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents to avoid floating-point precision issues.
/// Must be >= 0 (enforced by a CHECK constraint and by every debit path).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    pub id: Uuid,

    /// Owning user; unique, so each user has exactly one account
    pub user_id: Uuid,

    /// Current balance in cents
    pub balance_cents: i64,

    pub created_at: DateTime<Utc>,

    /// Timestamp of last balance update
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(user_id: Uuid, balance_cents: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance_cents,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to transfer money to another user.
///
/// # JSON Example
///
/// ```json
/// {
///   "to": "660e8400-e29b-41d4-a716-446655440001",
///   "amount": 2500
/// }
/// ```
///
/// The source is always the authenticated principal.
///
/// `amount` is a whole number of cents: `2500` moves 25.00 units. Fractional
/// values such as `25.5` are rejected as invalid input, never rounded.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Owner identity (user id) of the destination account
    pub to: Uuid,

    /// Amount in cents (integer, > 0)
    pub amount: i64,
}

impl Validate for TransferRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        Ok(())
    }
}

/// Response for `GET /api/v1/account/balance`.
///
/// `balance` is in cents: `1050` means 10.50 units.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Balance in cents
    pub balance: i64,
}

/// Response for a committed transfer.
///
/// # JSON Example
///
/// ```json
/// {
///   "message": "Transfer successful",
///   "balance": 7000
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    pub message: String,

    /// Sender's balance right after the transfer committed
    pub balance: i64,
}
