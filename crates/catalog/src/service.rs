use std::sync::Arc;

use chrono::Utc;

use tribunal_auth::Claims;
use tribunal_core::{DomainError, OrganisationId, TemplateId};
use tribunal_directory::{ManagementGuard, OrganisationStore, PrincipalStore};

use crate::store::TemplateStore;
use crate::template::{AppealTemplate, TemplateDraft};

/// Maximum number of templates an organisation owned by a free-tier
/// principal may hold. Hard ceiling, not a warning.
pub const FREE_TEMPLATE_QUOTA: usize = 2;

/// Manages template definitions for an organisation.
pub struct TemplateCatalog {
    templates: Arc<dyn TemplateStore>,
    organisations: Arc<dyn OrganisationStore>,
    principals: Arc<dyn PrincipalStore>,
    guard: ManagementGuard,
}

impl TemplateCatalog {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        organisations: Arc<dyn OrganisationStore>,
        principals: Arc<dyn PrincipalStore>,
    ) -> Self {
        let guard = ManagementGuard::new(organisations.clone());
        Self {
            templates,
            organisations,
            principals,
            guard,
        }
    }

    /// Create a template. Requires management capability; free-tier owners
    /// are capped at [`FREE_TEMPLATE_QUOTA`] templates per organisation.
    ///
    /// The quota is gated on the *owner's* plan tier, loaded fresh, not on
    /// whoever happens to be calling (a global admin acting on a premium
    /// organisation is not limited by their own tier).
    pub async fn create(
        &self,
        organisation: OrganisationId,
        claims: &Claims,
        draft: TemplateDraft,
    ) -> Result<AppealTemplate, DomainError> {
        if !self.guard.can_manage(organisation, claims).await {
            return Err(DomainError::Forbidden);
        }

        let org = self
            .organisations
            .get(organisation)
            .await?
            .ok_or_else(|| DomainError::not_found("organisation"))?;
        let owner = self
            .principals
            .get(org.owner)
            .await?
            .ok_or_else(|| DomainError::not_found("organisation owner"))?;

        if owner.plan_tier.is_free() {
            let count = self.templates.count_for_organisation(organisation).await?;
            if count >= FREE_TEMPLATE_QUOTA {
                return Err(DomainError::quota(format!(
                    "the free plan allows at most {FREE_TEMPLATE_QUOTA} appeal templates"
                )));
            }
        }

        let template = AppealTemplate::create(draft, organisation, Utc::now())?;
        self.templates.insert(template).await
    }

    /// Replace-set update: the draft's field list fully supersedes the
    /// stored one, and superseded fields are purged in the same atomic
    /// unit, so a concurrent reader never observes a union of old and new
    /// fields.
    pub async fn update(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
        claims: &Claims,
        draft: TemplateDraft,
    ) -> Result<AppealTemplate, DomainError> {
        if !self.guard.can_manage(organisation, claims).await {
            return Err(DomainError::Forbidden);
        }

        let mut template = self
            .templates
            .get(organisation, id)
            .await?
            .ok_or_else(|| DomainError::not_found("template"))?;
        template.replace(draft)?;
        self.templates.update_replacing_fields(template).await
    }

    /// Hard delete, cascading to fields and appeals. Deliberately does NOT
    /// check for open appeals against the template: retiring a form closes
    /// its history with it.
    pub async fn delete(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
        claims: &Claims,
    ) -> Result<(), DomainError> {
        if !self.guard.can_manage(organisation, claims).await {
            return Err(DomainError::Forbidden);
        }

        self.templates
            .get(organisation, id)
            .await?
            .ok_or_else(|| DomainError::not_found("template"))?;
        self.templates.delete_cascade(organisation, id).await
    }

    pub async fn get(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
    ) -> Result<AppealTemplate, DomainError> {
        self.templates
            .get(organisation, id)
            .await?
            .ok_or_else(|| DomainError::not_found("template"))
    }

    pub async fn list(
        &self,
        organisation: OrganisationId,
    ) -> Result<Vec<AppealTemplate>, DomainError> {
        self.templates.list(organisation).await
    }
}
