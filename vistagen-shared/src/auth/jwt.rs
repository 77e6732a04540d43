/// Session tokens
///
/// A session is nothing more than a signed pointer to an account identity.
/// The token carries no tier or usage data: the account store stays the
/// authority, so a client cannot grant itself a better tier by editing what
/// it holds.
///
/// Tokens are HS256-signed JWTs issued by "vistagen".
///
/// # Example
///
/// ```
/// use vistagen_shared::auth::jwt::{create_token, validate_token, SessionClaims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-test-secret-that-is-at-least-32-bytes";
/// let claims = SessionClaims::new("ana@example.com", Uuid::new_v4());
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_token(&token, secret)?;
/// assert_eq!(validated.sub, "ana@example.com");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token issuer
pub const ISSUER: &str = "vistagen";

/// Default session lifetime
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Issuer is not "vistagen"
    #[error("Invalid token issuer")]
    InvalidIssuer,
}

/// Session claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject - normalized account identity
    pub sub: String,

    /// Account ID at the time the session started
    pub account_id: Uuid,

    /// Issuer - always "vistagen"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl SessionClaims {
    /// Creates claims with the default lifetime
    pub fn new(identity: &str, account_id: Uuid) -> Self {
        Self::with_expiration(identity, account_id, Duration::hours(SESSION_LIFETIME_HOURS))
    }

    /// Creates claims expiring after `expires_in`
    pub fn with_expiration(identity: &str, account_id: Uuid, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: identity.to_string(),
            account_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &SessionClaims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, not-before and issuer
pub fn validate_token(token: &str, secret: &str) -> Result<SessionClaims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(data.claims)
}

/// Authenticated session attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Normalized account identity
    pub identity: String,

    /// Account ID recorded in the token
    pub account_id: Uuid,
}

impl From<SessionClaims> for SessionContext {
    fn from(claims: SessionClaims) -> Self {
        SessionContext {
            identity: claims.sub,
            account_id: claims.account_id,
        }
    }
}
