//! User service - registration, sign-in and profile management.
//!
//! Registration draws the seed balance and hands user and account creation
//! to the Identity Directory as one atomic unit.

use rand::Rng;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::user::{NewUser, ProfileChanges, SignupRequest, UpdateProfileRequest, User},
    services::password,
    store::IdentityDirectory,
};

/// Smallest seed balance, in cents.
pub const SEED_BALANCE_MIN: i64 = 100;
/// Largest seed balance, in cents.
pub const SEED_BALANCE_MAX: i64 = 100_000_000;

/// Draw the starting balance for a new account.
pub fn seed_balance() -> i64 {
    rand::rng().random_range(SEED_BALANCE_MIN..=SEED_BALANCE_MAX)
}

/// Register a new user with a freshly seeded account.
///
/// # Process
///
/// 1. Reject a username that is already taken (fast path)
/// 2. Hash the password on the blocking pool
/// 3. Create user and account atomically
///
/// The store re-checks uniqueness inside the creation itself, so two
/// concurrent signups for one username still produce exactly one user.
///
/// # Errors
///
/// - `DuplicateUsername`: Username already exists
pub async fn register(users: &dyn IdentityDirectory, request: SignupRequest) -> Result<User, AppError> {
    if users.find_by_username(&request.username).await?.is_some() {
        return Err(AppError::DuplicateUsername);
    }

    let password_hash = password::hash_password_blocking(request.password).await?;

    let user = users
        .create_user(
            NewUser {
                username: request.username,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
            },
            seed_balance(),
        )
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Resolve a username/password pair to a user.
///
/// Unknown usernames and wrong passwords produce the same error.
pub async fn authenticate(
    users: &dyn IdentityDirectory,
    username: &str,
    password: String,
) -> Result<User, AppError> {
    let user = users
        .find_by_username(username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !password::verify_password_blocking(password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Apply a partial profile update, re-hashing a new password if given.
pub async fn update_profile(
    users: &dyn IdentityDirectory,
    user_id: Uuid,
    request: UpdateProfileRequest,
) -> Result<User, AppError> {
    let password_hash = match request.password {
        Some(password) => Some(password::hash_password_blocking(password).await?),
        None => None,
    };

    users
        .update_profile(
            user_id,
            ProfileChanges {
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
            },
        )
        .await
}

pub async fn get_profile(users: &dyn IdentityDirectory, user_id: Uuid) -> Result<User, AppError> {
    users.find_by_id(user_id).await?.ok_or(AppError::UserNotFound)
}

pub async fn search(users: &dyn IdentityDirectory, filter: &str) -> Result<Vec<User>, AppError> {
    users.search(filter.trim()).await
}
