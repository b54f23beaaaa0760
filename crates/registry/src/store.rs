//! Storage ports for appeals and responses.

use async_trait::async_trait;

use tribunal_core::{AppealId, DomainError, OrganisationId};

use crate::appeal::{Appeal, AppealAnswer, AppealResponse};

/// Result of a decision compare-and-set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecisionApplied {
    /// The appeal was open and is now decided.
    Applied,
    /// The appeal had already been decided; nothing changed.
    AlreadyDecided,
}

#[async_trait]
pub trait AppealStore: Send + Sync {
    /// Atomic check-then-insert: persists `appeal` (status `Open`) together
    /// with its answers **unless** an open appeal by the same creator
    /// against the same template already exists, in which case it fails
    /// with `DuplicateOpenCase` and writes nothing.
    ///
    /// Implementations must make this race-free: two concurrent inserts for
    /// the same (creator, template) must not both succeed (serializing
    /// lock, or a transaction plus a partial unique index on
    /// (creator, template) where status = open).
    async fn insert_open(
        &self,
        appeal: Appeal,
        answers: Vec<AppealAnswer>,
    ) -> Result<Appeal, DomainError>;

    /// Organisation-scoped lookup (prevents cross-organisation disclosure).
    async fn get(
        &self,
        organisation: OrganisationId,
        id: AppealId,
    ) -> Result<Option<Appeal>, DomainError>;

    /// Unscoped lookup, for the response path where only the appeal id is
    /// known.
    async fn get_by_id(&self, id: AppealId) -> Result<Option<Appeal>, DomainError>;

    async fn list(&self, organisation: OrganisationId) -> Result<Vec<Appeal>, DomainError>;

    async fn answers(&self, id: AppealId) -> Result<Vec<AppealAnswer>, DomainError>;

    /// Compare-and-set `Open` → `Decided(code)`. Exactly one concurrent
    /// caller observes `Applied`; later (or losing) callers observe
    /// `AlreadyDecided`. `NotFound` if the appeal does not exist.
    async fn decide(
        &self,
        id: AppealId,
        code: crate::appeal::DecisionCode,
    ) -> Result<DecisionApplied, DomainError>;
}

#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn insert(&self, response: AppealResponse) -> Result<AppealResponse, DomainError>;

    async fn list_for_appeal(&self, id: AppealId) -> Result<Vec<AppealResponse>, DomainError>;
}
