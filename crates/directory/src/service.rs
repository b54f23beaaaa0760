use std::sync::Arc;

use chrono::Utc;

use tribunal_auth::{Claims, PasswordHasher, TokenPrincipal};
use tribunal_core::{DomainError, OrganisationId, PrincipalId};

use crate::guard::ManagementGuard;
use crate::organisation::{Organisation, OrganisationDraft, OrganisationPatch};
use crate::principal::{ExternalIdentity, Principal};
use crate::store::{OrganisationStore, PrincipalStore};

/// Registration, login and organisation management.
pub struct Directory {
    principals: Arc<dyn PrincipalStore>,
    organisations: Arc<dyn OrganisationStore>,
    hasher: Arc<dyn PasswordHasher>,
    guard: ManagementGuard,
}

impl Directory {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        organisations: Arc<dyn OrganisationStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let guard = ManagementGuard::new(organisations.clone());
        Self {
            principals,
            organisations,
            hasher,
            guard,
        }
    }

    /// Facts a token is minted from, for handlers that issue credentials.
    pub fn token_principal(principal: &Principal) -> TokenPrincipal {
        TokenPrincipal {
            principal_id: principal.id,
            email: principal.email.clone(),
            global_admin: principal.global_admin,
            plan_tier: principal.plan_tier.as_u8(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────

    /// Register with an email and password. Duplicate emails conflict.
    pub async fn register(&self, email: &str, password: &str) -> Result<Principal, DomainError> {
        let email = Principal::normalize_email(email)?;
        if password.is_empty() {
            return Err(DomainError::validation("password cannot be empty"));
        }
        let hash = self
            .hasher
            .hash(password)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        self.principals
            .insert(Principal::with_password(email, hash, Utc::now()))
            .await
    }

    /// Register (or fetch) an account backed by an external identity
    /// provider. If the email is already registered the existing principal
    /// is returned: the provider has already proven ownership of it.
    pub async fn register_external(
        &self,
        email: &str,
        identity: ExternalIdentity,
    ) -> Result<Principal, DomainError> {
        let email = Principal::normalize_email(email)?;

        if let Some(existing) = self.principals.find_by_email(&email).await? {
            return Ok(existing);
        }

        let fresh = Principal::with_external_identity(email.clone(), identity, Utc::now());
        match self.principals.insert(fresh).await {
            Ok(p) => Ok(p),
            // Lost a registration race; the winner is the account we want.
            Err(DomainError::Conflict(_)) => self
                .principals
                .find_by_email(&email)
                .await?
                .ok_or(DomainError::Unavailable),
            Err(e) => Err(e),
        }
    }

    /// Verify an email/password pair. Every failure mode answers
    /// `Unauthenticated`; the caller cannot distinguish an unknown email
    /// from a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Principal, DomainError> {
        let email = Principal::normalize_email(email).map_err(|_| DomainError::Unauthenticated)?;

        let principal = self
            .principals
            .find_by_email(&email)
            .await?
            .ok_or(DomainError::Unauthenticated)?;

        let Some(hash) = principal.password_hash.as_deref() else {
            return Err(DomainError::Unauthenticated);
        };
        if !self.hasher.verify(password, hash) {
            return Err(DomainError::Unauthenticated);
        }

        Ok(principal)
    }

    pub async fn get_principal(&self, id: PrincipalId) -> Result<Principal, DomainError> {
        self.principals
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user"))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Organisations
    // ─────────────────────────────────────────────────────────────────────

    /// Create an organisation owned by the caller.
    pub async fn create_organisation(
        &self,
        claims: &Claims,
        draft: OrganisationDraft,
    ) -> Result<Organisation, DomainError> {
        let organisation = Organisation::create(draft, claims.principal_id, Utc::now())?;
        self.organisations.insert(organisation).await
    }

    pub async fn get_organisation(&self, id: OrganisationId) -> Result<Organisation, DomainError> {
        self.organisations
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("organisation"))
    }

    pub async fn list_organisations(&self) -> Result<Vec<Organisation>, DomainError> {
        self.organisations.list().await
    }

    pub async fn organisations_by_owner(
        &self,
        owner: PrincipalId,
    ) -> Result<Vec<Organisation>, DomainError> {
        self.organisations.list_by_owner(owner).await
    }

    pub async fn update_organisation(
        &self,
        id: OrganisationId,
        claims: &Claims,
        patch: OrganisationPatch,
    ) -> Result<Organisation, DomainError> {
        if !self.guard.can_manage(id, claims).await {
            return Err(DomainError::Forbidden);
        }
        let mut organisation = self.get_organisation(id).await?;
        organisation.apply_patch(patch);
        self.organisations.update(organisation).await
    }

    pub async fn delete_organisation(
        &self,
        id: OrganisationId,
        claims: &Claims,
    ) -> Result<(), DomainError> {
        if !self.guard.can_manage(id, claims).await {
            return Err(DomainError::Forbidden);
        }
        self.organisations.delete_cascade(id).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Moderators
    // ─────────────────────────────────────────────────────────────────────

    pub async fn add_moderator(
        &self,
        id: OrganisationId,
        claims: &Claims,
        user: PrincipalId,
    ) -> Result<(), DomainError> {
        if !self.guard.can_manage(id, claims).await {
            return Err(DomainError::Forbidden);
        }
        // The moderator must be a known principal before it enters the set.
        self.get_principal(user).await?;
        self.organisations.add_moderator(id, user).await
    }

    pub async fn remove_moderator(
        &self,
        id: OrganisationId,
        claims: &Claims,
        user: PrincipalId,
    ) -> Result<(), DomainError> {
        if !self.guard.can_manage(id, claims).await {
            return Err(DomainError::Forbidden);
        }
        self.get_principal(user).await?;
        self.organisations.remove_moderator(id, user).await
    }
}
