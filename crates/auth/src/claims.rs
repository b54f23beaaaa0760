use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tribunal_core::PrincipalId;

/// Token claims model (transport-agnostic).
///
/// This is the full set of facts a verified bearer token carries. Every
/// field is named and typed; nothing is accessed by string key after
/// decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject / principal identifier.
    #[serde(rename = "sub")]
    pub principal_id: PrincipalId,

    /// Email the principal registered with.
    pub email: String,

    /// Whether the principal is a global administrator.
    #[serde(rename = "admin")]
    pub global_admin: bool,

    /// Plan tier (0 = free, >0 = premium).
    #[serde(rename = "plan")]
    pub plan_tier: u8,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Not-before timestamp (equal to `issued_at` for tokens we mint).
    #[serde(rename = "nbf", with = "chrono::serde::ts_seconds")]
    pub not_before: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    /// Token issuer.
    #[serde(rename = "iss")]
    pub issuer: String,

    /// Intended audience.
    #[serde(rename = "aud")]
    pub audience: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token signing failed")]
    Signing,
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature verification and decoding happen before this; the clock is
/// injected so the check stays pure and testable.
pub fn validate_window(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::Malformed);
    }
    if now < claims.not_before {
        return Err(TokenError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(())
}
