use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::Serialize;

use tribunal_core::PrincipalId;

use crate::claims::{Claims, TokenError, validate_window};

/// Lifetime of every issued token. Refresh extends by re-issuing, never by
/// stretching an existing token.
pub const TOKEN_TTL_MINUTES: i64 = 5;

/// Signing configuration, injected at construction. There is no process-wide
/// key; whoever builds the service owns where the secret comes from.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Identity facts a token is minted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPrincipal {
    pub principal_id: PrincipalId,
    pub email: String,
    pub global_admin: bool,
    pub plan_tier: u8,
}

/// A freshly signed token plus its expiry, as handed back to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IssuedToken {
    pub token: String,
    pub expiration: DateTime<Utc>,
}

/// Issues, validates and refreshes HMAC-SHA256 signed bearer tokens.
///
/// The key material is read-only after construction and safe to share across
/// concurrent validations. All operations take `now` explicitly so the
/// 5-minute window is checked against the caller's clock, not a hidden one.
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl CredentialService {
    pub fn new(config: TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window is validated against the injected `now` in
        // `validate_window`, not against the library's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer,
            audience: config.audience,
        }
    }

    /// Sign a token for `principal` with a fresh 5-minute window.
    pub fn issue(
        &self,
        principal: &TokenPrincipal,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + Duration::minutes(TOKEN_TTL_MINUTES);
        let claims = Claims {
            principal_id: principal.principal_id,
            email: principal.email.clone(),
            global_admin: principal.global_admin,
            plan_tier: principal.plan_tier,
            issued_at: now,
            not_before: now,
            expires_at,
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(error = %e, "token signing failed");
                TokenError::Signing
            })?;

        Ok(IssuedToken {
            token,
            expiration: expires_at,
        })
    }

    /// Verify signature and shape, then the time window against `now`.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })?;

        validate_window(&data.claims, now)?;
        Ok(data.claims)
    }

    /// Re-validate `token` and mint a replacement with the same identity
    /// claims and a new 5-minute window.
    ///
    /// An already-expired token refuses with `Expired`. There is no grace
    /// period; the caller must authenticate again.
    pub fn refresh(&self, token: &str, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let claims = self.validate(token, now)?;
        self.issue(
            &TokenPrincipal {
                principal_id: claims.principal_id,
                email: claims.email,
                global_admin: claims.global_admin,
                plan_tier: claims.plan_tier,
            },
            now,
        )
    }
}
