//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the token from the Authorization header
//! 2. Verify its signature and expiry
//! 3. Inject the principal into the request
//! 4. Reject unauthenticated requests with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{app::AppState, error::AppError};

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; handlers extract it with
/// `Extension<AuthContext>` to learn who is acting.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    /// The principal: id of the user the token was issued to
    pub user_id: Uuid,
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Verify the token (signature, expiry)
/// 3. If valid: inject `AuthContext` into request, call next handler
/// 4. Otherwise: return 401 Unauthorized
///
/// The principal is not looked up in the directory here; handlers that need
/// the user record fetch it themselves and report `UserNotFound`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthenticated)?;

    let user_id = state.tokens.verify(token.trim())?;

    request.extensions_mut().insert(AuthContext { user_id });

    Ok(next.run(request).await)
}
