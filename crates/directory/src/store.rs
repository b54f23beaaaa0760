//! Storage ports for principals and organisations.
//!
//! Implementations live in `tribunal-storage`. Uniqueness (principal email,
//! organisation url) and cascade atomicity are store responsibilities: the
//! service layer cannot check-then-insert race-free on its own.

use async_trait::async_trait;

use tribunal_core::{DomainError, OrganisationId, PrincipalId};

use crate::organisation::Organisation;
use crate::principal::Principal;

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Insert a new principal. Fails with `Conflict` if the email is taken.
    async fn insert(&self, principal: Principal) -> Result<Principal, DomainError>;

    async fn get(&self, id: PrincipalId) -> Result<Option<Principal>, DomainError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DomainError>;
}

#[async_trait]
pub trait OrganisationStore: Send + Sync {
    /// Insert a new organisation. Fails with `Conflict` if the url is taken.
    async fn insert(&self, organisation: Organisation) -> Result<Organisation, DomainError>;

    async fn get(&self, id: OrganisationId) -> Result<Option<Organisation>, DomainError>;

    async fn list(&self) -> Result<Vec<Organisation>, DomainError>;

    async fn list_by_owner(&self, owner: PrincipalId) -> Result<Vec<Organisation>, DomainError>;

    /// Persist mutated scalar fields (name, description, icon, verified).
    async fn update(&self, organisation: Organisation) -> Result<Organisation, DomainError>;

    /// Hard delete with explicit ordered cascade: answers, responses,
    /// appeals, templates (and their fields), moderator links, then the
    /// organisation row, all in one transaction.
    async fn delete_cascade(&self, id: OrganisationId) -> Result<(), DomainError>;

    /// Add `user` to the moderator set. Idempotent.
    async fn add_moderator(
        &self,
        id: OrganisationId,
        user: PrincipalId,
    ) -> Result<(), DomainError>;

    /// Remove `user` from the moderator set. Idempotent.
    async fn remove_moderator(
        &self,
        id: OrganisationId,
        user: PrincipalId,
    ) -> Result<(), DomainError>;
}
