//! Bearer tokens carrying the authenticated attendee.
//!
//! Tokens are HS256 JWTs. The `sub` claim is the attendee id and is the only
//! source of identity for attendance operations. `ttl_seconds` is both the
//! lifetime given to minted tokens and the longest lifetime a verified token
//! may claim.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{
    domain::AttendeeId,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token lifetime of {0} seconds is out of range")]
    InvalidTtl(i64),
    #[error(transparent)]
    Encode(#[from] jsonwebtoken::errors::Error),
}

pub fn mint_token(cfg: &SessionConfig, attendee_id: &AttendeeId) -> Result<String, SessionError> {
    let now = Utc::now();
    let exp = Duration::try_seconds(cfg.ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(SessionError::InvalidTtl(cfg.ttl_seconds))?;
    let claims = SessionClaims {
        iss: cfg.issuer.clone(),
        sub: attendee_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn verify_token(cfg: &SessionConfig, token: &str) -> Result<AttendeeId, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[cfg.issuer.as_str()]);

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| ApiError::new(ErrorCode::Unauthorized, format!("invalid session token: {e}")))?;

    if data.claims.exp.saturating_sub(data.claims.iat) > cfg.ttl_seconds {
        return Err(ApiError::new(
            ErrorCode::Unauthorized,
            "session token lifetime exceeds the allowed maximum",
        ));
    }

    let sub = data.claims.sub.trim();
    if sub.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Unauthorized,
            "session token has no subject",
        ));
    }
    Ok(AttendeeId::new(sub))
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
