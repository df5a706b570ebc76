//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, query, auth context)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

/// Balance and transfer endpoints
pub mod accounts;
/// Validating JSON extractor
pub mod extract;
/// Liveness endpoint
pub mod health;
/// Signup, signin and profile endpoints
pub mod users;
