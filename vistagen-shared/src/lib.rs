//! # Vistagen Shared Library
//!
//! Account data, quota rules and the payment boundary shared by the
//! generation engine and the API server.
//!
//! ## Module Organization
//!
//! - `models`: Account record and tier definitions
//! - `quota`: Pure quota evaluation, commit and upgrade
//! - `store`: Account persistence (in-memory and PostgreSQL)
//! - `accounts`: Account lifecycle on top of a store
//! - `locks`: Per-identity locks serializing account writes
//! - `auth`: Session tokens
//! - `payment`: Payment gateway boundary and mock processor
//! - `clock`: Time source used for day boundaries
//! - `db`: PostgreSQL pool and migrations

pub mod accounts;
pub mod auth;
pub mod clock;
pub mod db;
pub mod locks;
pub mod models;
pub mod payment;
pub mod quota;
pub mod store;

/// Current version of the Vistagen shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
