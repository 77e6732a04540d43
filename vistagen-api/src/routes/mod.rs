/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Session endpoints (register, login)
/// - `account`: Account and quota status
/// - `generations`: Usage-gated artifact generation
/// - `videos`: Video extension of a generated artifact
/// - `subscriptions`: Tier purchase
/// - `admin`: Account listing and editing

pub mod account;
pub mod admin;
pub mod auth;
pub mod generations;
pub mod health;
pub mod subscriptions;
pub mod videos;
