//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They drive store transactions, validation, and credential handling.

pub mod password;
pub mod token_service;
pub mod transfer_service;
pub mod user_service;
