//! User HTTP handlers.
//!
//! This module implements the user-related API endpoints:
//! - POST /api/v1/user/signup - Register and receive a token
//! - POST /api/v1/user/signin - Exchange credentials for a token
//! - PUT /api/v1/user - Update own profile
//! - GET /api/v1/user/bulk?filter= - Search users by name
//! - GET /api/v1/user - Own profile

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use super::extract::ValidatedJson;
use crate::{
    app::AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::user::{
        BulkQuery, BulkResponse, MessageResponse, SigninRequest, SignupRequest, SignupResponse,
        TokenResponse, UpdateProfileRequest, UserProfile,
    },
    services::user_service,
};

/// Register a new user.
///
/// # Request Body
///
/// ```json
/// {
///   "username": "alice@example.com",
///   "firstName": "Alice",
///   "lastName": "Liddell",
///   "password": "rabbit-hole"
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{ "message": "User created successfully", "token": "<jwt>" }`
/// - **Error (411)**: Invalid input or username already taken
///
/// The new user's account is created in the same transaction with a
/// random seed balance.
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> Result<Json<SignupResponse>, AppError> {
    let user = user_service::register(state.users.as_ref(), request).await?;
    let token = state.tokens.issue(user.id)?;

    Ok(Json(SignupResponse {
        message: "User created successfully".to_string(),
        token,
    }))
}

/// Sign in with username and password.
///
/// # Response
///
/// - **Success (200 OK)**: `{ "token": "<jwt>" }`
/// - **Error (411)**: Invalid input or credentials
pub async fn signin(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SigninRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user =
        user_service::authenticate(state.users.as_ref(), &request.username, request.password).await?;
    let token = state.tokens.issue(user.id)?;

    Ok(Json(TokenResponse { token }))
}

/// Update the authenticated user's profile.
///
/// Only `password`, `firstName` and `lastName` may be sent; each is optional.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    user_service::update_profile(state.users.as_ref(), auth.user_id, request).await?;

    Ok(Json(MessageResponse {
        message: "Updated successfully".to_string(),
    }))
}

/// Search users by first or last name.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "users": [
///     { "id": "...", "username": "alice", "firstName": "Alice", "lastName": "Liddell" }
///   ]
/// }
/// ```
pub async fn bulk(
    State(state): State<AppState>,
    Query(query): Query<BulkQuery>,
) -> Result<Json<BulkResponse>, AppError> {
    let users = user_service::search(state.users.as_ref(), &query.filter).await?;

    Ok(Json(BulkResponse {
        users: users.into_iter().map(UserProfile::from).collect(),
    }))
}

/// Get the authenticated user's profile (credential excluded).
///
/// Returns 404 if the token's user no longer exists.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserProfile>, AppError> {
    let user = user_service::get_profile(state.users.as_ref(), auth.user_id).await?;

    Ok(Json(user.into()))
}
