use std::sync::Arc;

use chrono::Utc;

use tribunal_catalog::TemplateStore;
use tribunal_core::{AppealId, DomainError, OrganisationId, PrincipalId};
use tribunal_directory::OrganisationStore;

use crate::appeal::{Appeal, AppealAnswer, CaseDraft};
use crate::store::AppealStore;

/// Drives the appeal lifecycle and owns the single-open-case invariant.
pub struct CaseRegistry {
    appeals: Arc<dyn AppealStore>,
    organisations: Arc<dyn OrganisationStore>,
    templates: Arc<dyn TemplateStore>,
}

impl CaseRegistry {
    pub fn new(
        appeals: Arc<dyn AppealStore>,
        organisations: Arc<dyn OrganisationStore>,
        templates: Arc<dyn TemplateStore>,
    ) -> Self {
        Self {
            appeals,
            organisations,
            templates,
        }
    }

    /// Open a case for `creator` against a template of `organisation`.
    ///
    /// Validates that the organisation exists, that the template exists and
    /// belongs to it, and that every answer references one of the
    /// template's fields. The open-case check and the insert are a single
    /// atomic store operation, see [`AppealStore::insert_open`].
    pub async fn create_case(
        &self,
        organisation: OrganisationId,
        creator: PrincipalId,
        draft: CaseDraft,
    ) -> Result<Appeal, DomainError> {
        self.organisations
            .get(organisation)
            .await?
            .ok_or_else(|| DomainError::not_found("organisation"))?;

        let template = self
            .templates
            .get(organisation, draft.template)
            .await?
            .ok_or_else(|| DomainError::not_found("template"))?;

        let appeal = Appeal::open(
            organisation,
            template.id,
            creator,
            draft.content,
            Utc::now(),
        );

        let answers = draft
            .answers
            .into_iter()
            .map(|a| {
                let field = template.field(a.field).ok_or_else(|| {
                    DomainError::validation(format!(
                        "answer references unknown field '{}'",
                        a.field
                    ))
                })?;
                Ok(AppealAnswer {
                    id: tribunal_core::AnswerId::new(),
                    appeal: appeal.id,
                    field: field.id,
                    kind: field.kind,
                    content: a.content,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        self.appeals.insert_open(appeal, answers).await
    }

    /// Organisation-scoped fetch; appeals of other organisations are
    /// indistinguishable from absent ones.
    pub async fn get_case(
        &self,
        organisation: OrganisationId,
        id: AppealId,
    ) -> Result<Appeal, DomainError> {
        self.appeals
            .get(organisation, id)
            .await?
            .ok_or_else(|| DomainError::not_found("appeal"))
    }

    pub async fn list_cases(
        &self,
        organisation: OrganisationId,
    ) -> Result<Vec<Appeal>, DomainError> {
        self.appeals.list(organisation).await
    }

    pub async fn case_answers(&self, id: AppealId) -> Result<Vec<AppealAnswer>, DomainError> {
        self.appeals.answers(id).await
    }
}
