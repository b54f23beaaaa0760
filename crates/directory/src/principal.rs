use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribunal_core::{DomainError, Entity, PrincipalId};

/// Plan tier: 0 = free, anything above is premium.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PlanTier(pub u8);

impl PlanTier {
    pub const FREE: PlanTier = PlanTier(0);

    pub fn is_free(&self) -> bool {
        self.0 == 0
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// Link to an identity held by an external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider: String,
    pub subject: String,
}

/// An authenticated identity (human user).
///
/// Exactly one of `password_hash` / `external_identity` is expected to be
/// set: accounts registered through a provider carry no local credential.
/// Email uniqueness is enforced by the store, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub external_identity: Option<ExternalIdentity>,
    pub global_admin: bool,
    pub plan_tier: PlanTier,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// Normalize and validate an email address (existence-level only).
    pub fn normalize_email(email: &str) -> Result<String, DomainError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email address"));
        }
        Ok(email)
    }

    pub fn with_password(email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: PrincipalId::new(),
            email,
            password_hash: Some(password_hash),
            external_identity: None,
            global_admin: false,
            plan_tier: PlanTier::FREE,
            created_at: now,
            deleted_at: None,
        }
    }

    pub fn with_external_identity(
        email: String,
        identity: ExternalIdentity,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PrincipalId::new(),
            email,
            password_hash: None,
            external_identity: Some(identity),
            global_admin: false,
            plan_tier: PlanTier::FREE,
            created_at: now,
            deleted_at: None,
        }
    }
}

impl Entity for Principal {
    type Id = PrincipalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
