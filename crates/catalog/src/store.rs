//! Storage port for appeal templates.

use async_trait::async_trait;

use tribunal_core::{DomainError, OrganisationId, TemplateId};

use crate::template::AppealTemplate;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert(&self, template: AppealTemplate) -> Result<AppealTemplate, DomainError>;

    /// Organisation-scoped lookup; a template never resolves outside its
    /// owning organisation.
    async fn get(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
    ) -> Result<Option<AppealTemplate>, DomainError>;

    async fn list(&self, organisation: OrganisationId) -> Result<Vec<AppealTemplate>, DomainError>;

    async fn count_for_organisation(
        &self,
        organisation: OrganisationId,
    ) -> Result<usize, DomainError>;

    /// Persist a replace-set update as one atomic unit: the stored field set
    /// becomes exactly `template.fields`, and fields dropped by the
    /// replacement are purged in the same transaction. Concurrent readers
    /// see the old set or the new set, never a partial union.
    async fn update_replacing_fields(
        &self,
        template: AppealTemplate,
    ) -> Result<AppealTemplate, DomainError>;

    /// Hard delete, cascading to fields and to appeals against the template
    /// (with their responses and answers), as explicit ordered deletes in
    /// one transaction.
    async fn delete_cascade(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
    ) -> Result<(), DomainError>;
}
