/// Authentication utilities
///
/// Vistagen does not verify identities; a session only proves that the
/// server issued a token for an identity that exists in the account store.
///
/// - [`jwt`]: session token issuing and validation

pub mod jwt;
