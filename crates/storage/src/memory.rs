//! In-memory store for tests and dev mode.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use tribunal_catalog::{AppealTemplate, TemplateStore};
use tribunal_core::{AppealId, DomainError, OrganisationId, PrincipalId, TemplateId};
use tribunal_directory::{Organisation, OrganisationStore, Principal, PrincipalStore};
use tribunal_registry::{
    Appeal, AppealAnswer, AppealResponse, AppealStore, DecisionApplied, DecisionCode,
    ResponseStore,
};

#[derive(Debug, Default)]
struct DataSet {
    principals: HashMap<PrincipalId, Principal>,
    organisations: HashMap<OrganisationId, Organisation>,
    templates: HashMap<TemplateId, AppealTemplate>,
    appeals: HashMap<AppealId, Appeal>,
    answers: HashMap<AppealId, Vec<AppealAnswer>>,
    responses: HashMap<AppealId, Vec<AppealResponse>>,
}

/// Whole-dataset store guarded by one lock.
///
/// Every multi-entity operation (open-case insert, replace-then-purge,
/// cascaded deletes) runs under the write lock, which is exactly the
/// "equivalent serializing lock" the invariants ask for. IDs are UUIDv7,
/// so sorting by id gives storage order = creation order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<DataSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&DataSet) -> T) -> Result<T, DomainError> {
        let data = self.inner.read().map_err(|_| DomainError::Unavailable)?;
        Ok(f(&data))
    }

    fn write<T>(&self, f: impl FnOnce(&mut DataSet) -> T) -> Result<T, DomainError> {
        let mut data = self.inner.write().map_err(|_| DomainError::Unavailable)?;
        Ok(f(&mut data))
    }
}

impl DataSet {
    fn purge_appeal(&mut self, id: AppealId) {
        self.answers.remove(&id);
        self.responses.remove(&id);
        self.appeals.remove(&id);
    }

    fn purge_template(&mut self, id: TemplateId) {
        let appeal_ids: Vec<AppealId> = self
            .appeals
            .values()
            .filter(|a| a.template == id)
            .map(|a| a.id)
            .collect();
        for appeal in appeal_ids {
            self.purge_appeal(appeal);
        }
        self.templates.remove(&id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Principals
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn insert(&self, principal: Principal) -> Result<Principal, DomainError> {
        self.write(|data| {
            if data.principals.values().any(|p| p.email == principal.email) {
                return Err(DomainError::conflict("email already registered"));
            }
            data.principals.insert(principal.id, principal.clone());
            Ok(principal)
        })?
    }

    async fn get(&self, id: PrincipalId) -> Result<Option<Principal>, DomainError> {
        self.read(|data| data.principals.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DomainError> {
        self.read(|data| data.principals.values().find(|p| p.email == email).cloned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Organisations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrganisationStore for MemoryStore {
    async fn insert(&self, organisation: Organisation) -> Result<Organisation, DomainError> {
        self.write(|data| {
            if data.organisations.values().any(|o| o.url == organisation.url) {
                return Err(DomainError::conflict("organisation url already taken"));
            }
            data.organisations
                .insert(organisation.id, organisation.clone());
            Ok(organisation)
        })?
    }

    async fn get(&self, id: OrganisationId) -> Result<Option<Organisation>, DomainError> {
        self.read(|data| data.organisations.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Organisation>, DomainError> {
        self.read(|data| {
            let mut all: Vec<Organisation> = data.organisations.values().cloned().collect();
            all.sort_by_key(|o| o.id);
            all
        })
    }

    async fn list_by_owner(&self, owner: PrincipalId) -> Result<Vec<Organisation>, DomainError> {
        self.read(|data| {
            let mut owned: Vec<Organisation> = data
                .organisations
                .values()
                .filter(|o| o.owner == owner)
                .cloned()
                .collect();
            owned.sort_by_key(|o| o.id);
            owned
        })
    }

    async fn update(&self, organisation: Organisation) -> Result<Organisation, DomainError> {
        self.write(|data| {
            if !data.organisations.contains_key(&organisation.id) {
                return Err(DomainError::not_found("organisation"));
            }
            data.organisations
                .insert(organisation.id, organisation.clone());
            Ok(organisation)
        })?
    }

    async fn delete_cascade(&self, id: OrganisationId) -> Result<(), DomainError> {
        self.write(|data| {
            if data.organisations.remove(&id).is_none() {
                return Err(DomainError::not_found("organisation"));
            }

            let appeal_ids: Vec<AppealId> = data
                .appeals
                .values()
                .filter(|a| a.organisation == id)
                .map(|a| a.id)
                .collect();
            for appeal in appeal_ids {
                data.purge_appeal(appeal);
            }

            data.templates.retain(|_, t| t.organisation != id);
            Ok(())
        })?
    }

    async fn add_moderator(
        &self,
        id: OrganisationId,
        user: PrincipalId,
    ) -> Result<(), DomainError> {
        self.write(|data| {
            let org = data
                .organisations
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found("organisation"))?;
            org.add_moderator(user);
            Ok(())
        })?
    }

    async fn remove_moderator(
        &self,
        id: OrganisationId,
        user: PrincipalId,
    ) -> Result<(), DomainError> {
        self.write(|data| {
            let org = data
                .organisations
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found("organisation"))?;
            org.remove_moderator(user);
            Ok(())
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Templates
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn insert(&self, template: AppealTemplate) -> Result<AppealTemplate, DomainError> {
        self.write(|data| {
            data.templates.insert(template.id, template.clone());
            template
        })
    }

    async fn get(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
    ) -> Result<Option<AppealTemplate>, DomainError> {
        self.read(|data| {
            data.templates
                .get(&id)
                .filter(|t| t.organisation == organisation)
                .cloned()
        })
    }

    async fn list(&self, organisation: OrganisationId) -> Result<Vec<AppealTemplate>, DomainError> {
        self.read(|data| {
            let mut all: Vec<AppealTemplate> = data
                .templates
                .values()
                .filter(|t| t.organisation == organisation)
                .cloned()
                .collect();
            all.sort_by_key(|t| t.id);
            all
        })
    }

    async fn count_for_organisation(
        &self,
        organisation: OrganisationId,
    ) -> Result<usize, DomainError> {
        self.read(|data| {
            data.templates
                .values()
                .filter(|t| t.organisation == organisation)
                .count()
        })
    }

    async fn update_replacing_fields(
        &self,
        template: AppealTemplate,
    ) -> Result<AppealTemplate, DomainError> {
        // Fields live inside the template record, so swapping the record is
        // the whole replace-then-purge: superseded fields cease to exist in
        // the same write.
        self.write(|data| {
            if !data.templates.contains_key(&template.id) {
                return Err(DomainError::not_found("template"));
            }
            data.templates.insert(template.id, template.clone());
            Ok(template)
        })?
    }

    async fn delete_cascade(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
    ) -> Result<(), DomainError> {
        self.write(|data| {
            match data.templates.get(&id) {
                Some(t) if t.organisation == organisation => {}
                _ => return Err(DomainError::not_found("template")),
            }
            data.purge_template(id);
            Ok(())
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Appeals & responses
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AppealStore for MemoryStore {
    async fn insert_open(
        &self,
        appeal: Appeal,
        answers: Vec<AppealAnswer>,
    ) -> Result<Appeal, DomainError> {
        self.write(|data| {
            let duplicate = data.appeals.values().any(|a| {
                a.creator == appeal.creator
                    && a.template == appeal.template
                    && a.status.is_open()
            });
            if duplicate {
                return Err(DomainError::DuplicateOpenCase);
            }
            data.answers.insert(appeal.id, answers);
            data.appeals.insert(appeal.id, appeal.clone());
            Ok(appeal)
        })?
    }

    async fn get(
        &self,
        organisation: OrganisationId,
        id: AppealId,
    ) -> Result<Option<Appeal>, DomainError> {
        self.read(|data| {
            data.appeals
                .get(&id)
                .filter(|a| a.organisation == organisation)
                .cloned()
        })
    }

    async fn get_by_id(&self, id: AppealId) -> Result<Option<Appeal>, DomainError> {
        self.read(|data| data.appeals.get(&id).cloned())
    }

    async fn list(&self, organisation: OrganisationId) -> Result<Vec<Appeal>, DomainError> {
        self.read(|data| {
            let mut all: Vec<Appeal> = data
                .appeals
                .values()
                .filter(|a| a.organisation == organisation)
                .cloned()
                .collect();
            all.sort_by_key(|a| a.id);
            all
        })
    }

    async fn answers(&self, id: AppealId) -> Result<Vec<AppealAnswer>, DomainError> {
        self.read(|data| data.answers.get(&id).cloned().unwrap_or_default())
    }

    async fn decide(
        &self,
        id: AppealId,
        code: DecisionCode,
    ) -> Result<DecisionApplied, DomainError> {
        self.write(|data| {
            let appeal = data
                .appeals
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found("appeal"))?;
            match appeal.decide(code) {
                Ok(()) => Ok(DecisionApplied::Applied),
                Err(_) => Ok(DecisionApplied::AlreadyDecided),
            }
        })?
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn insert(&self, response: AppealResponse) -> Result<AppealResponse, DomainError> {
        self.write(|data| {
            data.responses
                .entry(response.appeal)
                .or_default()
                .push(response.clone());
            response
        })
    }

    async fn list_for_appeal(&self, id: AppealId) -> Result<Vec<AppealResponse>, DomainError> {
        self.read(|data| data.responses.get(&id).cloned().unwrap_or_default())
    }
}
