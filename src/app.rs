//! Application state and HTTP router.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers, middleware,
    services::{token_service::TokenIssuer, transfer_service::TransferCoordinator},
    store::{AccountStore, IdentityDirectory},
};

/// Shared state handed to every handler.
///
/// Both store handles point at the same backend instance, created once at
/// startup.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub users: Arc<dyn IdentityDirectory>,
    pub transfers: TransferCoordinator,
    pub tokens: TokenIssuer,
}

/// Transfer tuning knobs taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct TransferSettings {
    pub attempt_timeout: Duration,
    pub max_retries: u32,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, tokens: TokenIssuer, settings: TransferSettings) -> Self
    where
        S: AccountStore + IdentityDirectory + 'static,
    {
        let accounts: Arc<dyn AccountStore> = store.clone();
        let users: Arc<dyn IdentityDirectory> = store;

        Self {
            transfers: TransferCoordinator::new(
                accounts.clone(),
                settings.attempt_timeout,
                settings.max_retries,
            ),
            accounts,
            users,
            tokens,
        }
    }
}

/// Build the HTTP router.
///
/// # Routes
///
/// Public:
/// - `GET /health`
/// - `POST /api/v1/user/signup`
/// - `POST /api/v1/user/signin`
///
/// Bearer token required:
/// - `GET|PUT /api/v1/user`
/// - `GET /api/v1/user/bulk`
/// - `GET /api/v1/account/balance`
/// - `POST /api/v1/account/transfer`
pub fn create_app(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        .route(
            "/api/v1/user",
            get(handlers::users::get_profile).put(handlers::users::update_profile),
        )
        .route("/api/v1/user/bulk", get(handlers::users::bulk))
        .route(
            "/api/v1/account/balance",
            get(handlers::accounts::get_balance),
        )
        .route(
            "/api/v1/account/transfer",
            post(handlers::accounts::transfer),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/user/signup", post(handlers::users::signup))
        .route("/api/v1/user/signin", post(handlers::users::signin))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
