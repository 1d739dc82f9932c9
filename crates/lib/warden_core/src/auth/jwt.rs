//! Session token codec: HS256 signing and verification of [`SessionClaims`].
//!
//! Pure functions over claims and a secret. Expiry is checked against an
//! explicit `now` so callers (and tests) control the clock.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, rng};
use tracing::warn;

use super::AuthError;
use crate::models::auth::SessionClaims;

/// Minimum decoded secret length for HS256.
pub const MIN_SECRET_LEN: usize = 32;

/// Sign a claim set (HS256).
pub fn sign(claims: &SessionClaims, secret: &[u8]) -> Result<String, AuthError> {
    if claims.exp <= claims.iat {
        return Err(AuthError::Internal(
            "token expiry must be later than issue time".into(),
        ));
    }
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Verify signature, structure and expiry against the current time.
pub fn verify(token: &str, secret: &[u8]) -> Result<SessionClaims, AuthError> {
    verify_at(token, secret, Utc::now())
}

/// Verify signature, structure and expiry against `now`.
pub fn verify_at(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<SessionClaims, AuthError> {
    let claims = decode_claims(token, secret)?;
    check_expiry(&claims, now)?;
    Ok(claims)
}

/// Verify signature and structure only; expiry is left to the caller.
pub fn decode_claims(token: &str, secret: &[u8]) -> Result<SessionClaims, AuthError> {
    if token.trim().is_empty() {
        return Err(AuthError::TokenMalformed("empty token".into()));
    }
    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation())
        .map(|data| data.claims)
        .map_err(map_decode_error)
}

/// A token is live while `now < exp`.
pub fn check_expiry(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), AuthError> {
    if now.timestamp() < claims.exp {
        Ok(())
    } else {
        Err(AuthError::TokenExpired)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry runs in `check_expiry` against an explicit clock.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["sub", "exp", "iat"]);
    validation
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenMalformed(e.to_string()),
    }
}

/// Decode a base64 session secret and enforce the minimum length.
pub fn decode_secret(encoded: &str) -> Result<Vec<u8>, AuthError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::Internal(format!("session secret is not base64: {e}")))?;
    if bytes.len() < MIN_SECRET_LEN {
        return Err(AuthError::Internal(format!(
            "session secret must decode to at least {MIN_SECRET_LEN} bytes"
        )));
    }
    Ok(bytes)
}

/// Resolve the session secret: env var `SESSION_SECRET` (base64), or a random
/// per-process secret when unset.
pub fn resolve_session_secret() -> Result<Vec<u8>, AuthError> {
    if let Ok(encoded) = std::env::var("SESSION_SECRET")
        && !encoded.trim().is_empty()
    {
        return decode_secret(&encoded);
    }
    warn!("SESSION_SECRET not set; generated an ephemeral secret, sessions end on restart");
    Ok(generate_secret())
}

/// 64 random bytes.
pub fn generate_secret() -> Vec<u8> {
    let mut bytes = vec![0u8; 64];
    rng().fill(bytes.as_mut_slice());
    bytes
}
