/// Data models for Vistagen
///
/// # Models
///
/// - `account`: Accounts, tiers and admin edits

pub mod account;
