//! Wallet Service
//!
//! A REST API where every user holds one account, can read its balance, and
//! can send funds to another user. Transfers debit and credit both accounts
//! in one store transaction under ordered per-account locks.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: PostgreSQL via sqlx, or an in-memory store when no database is configured
//! - **Authentication**: HS256 bearer tokens, Argon2id password hashes
//! - **Format**: JSON requests/responses

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
