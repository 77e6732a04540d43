/// Middleware modules for the API server
///
/// - Session authentication (bearer JWT)
/// - Admin key authentication

pub mod auth;
