/// Database plumbing for the PostgreSQL account store
///
/// - `pool`: connection pool creation and health checks
/// - `migrations`: embedded schema migrations

pub mod migrations;
pub mod pool;
