//! Data models representing database entities and API payloads.

/// Account and transfer models
pub mod account;
/// User identity and profile models
pub mod user;
/// Request field validation
pub mod validation;
