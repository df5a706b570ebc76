//! Account HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - GET /api/v1/account/balance - Balance of the authenticated user
//! - POST /api/v1/account/transfer - Move money to another user
//!
//! Every amount and balance on these endpoints is an integer number of
//! cents. Clients holding currency units multiply by 100 before sending.

use axum::{Extension, Json, extract::State};

use super::extract::ValidatedJson;
use crate::{
    app::AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::account::{BalanceResponse, TransferRequest, TransferResponse},
};

/// Get the authenticated user's balance.
///
/// # Response
///
/// - **Success (200 OK)**: `{ "balance": 1050 }` (cents)
/// - **Error (401)**: Missing or invalid token
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.accounts.get_balance(auth.user_id).await?;

    Ok(Json(BalanceResponse { balance }))
}

/// Transfer money from the authenticated user to another user.
///
/// # Request Body
///
/// ```json
/// {
///   "to": "660e8400-e29b-41d4-a716-446655440001",
///   "amount": 2500
/// }
/// ```
///
/// `amount` is in cents; `2500` moves 25.00 units. A fractional or
/// non-numeric amount is rejected with 411 before any balance is touched.
///
/// # Atomicity
///
/// Both accounts are updated in a single store transaction.
/// Either both change or neither does.
///
/// # Response
///
/// - **Success (200 OK)**: `{ "message": "Transfer successful", "balance": 7500 }` (cents)
/// - **Error (400)**: Insufficient funds, unknown recipient, bad amount, or self-transfer
/// - **Error (409)**: Contention; nothing changed, safe to retry
pub async fn transfer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(request): ValidatedJson<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    let receipt = state
        .transfers
        .transfer(auth.user_id, request.to, request.amount)
        .await?;

    Ok(Json(TransferResponse {
        message: "Transfer successful".to_string(),
        balance: receipt.source_balance,
    }))
}
