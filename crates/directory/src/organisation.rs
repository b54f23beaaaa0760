use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribunal_core::{DomainError, Entity, OrganisationId, PrincipalId};

/// A tenant owning appeal templates and cases.
///
/// The moderator set is an owned mapping maintained exclusively through
/// [`Organisation::add_moderator`] / [`Organisation::remove_moderator`]
/// (no implicit join table). Moderators may read and respond to cases but
/// never manage the organisation; that is the owner's (or a global
/// admin's) capability alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: OrganisationId,
    pub name: String,
    /// Unique URL slug the organisation is reachable under.
    pub url: String,
    pub description: String,
    pub icon_hash: Option<String>,
    pub owner: PrincipalId,
    pub moderators: HashSet<PrincipalId>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating an organisation.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganisationDraft {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganisationPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_hash: Option<String>,
}

impl Organisation {
    pub fn create(
        draft: OrganisationDraft,
        owner: PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("organisation name cannot be empty"));
        }
        let url = draft.url.trim().to_lowercase();
        if url.is_empty() {
            return Err(DomainError::validation("organisation url cannot be empty"));
        }

        Ok(Self {
            id: OrganisationId::new(),
            name,
            url,
            description: draft.description,
            icon_hash: None,
            owner,
            moderators: HashSet::new(),
            verified: false,
            created_at: now,
            deleted_at: None,
        })
    }

    pub fn apply_patch(&mut self, patch: OrganisationPatch) {
        if let Some(name) = patch.name {
            if !name.trim().is_empty() {
                self.name = name;
            }
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(icon_hash) = patch.icon_hash {
            self.icon_hash = Some(icon_hash);
        }
    }

    /// Idempotent: adding an existing moderator is a no-op.
    pub fn add_moderator(&mut self, user: PrincipalId) -> bool {
        self.moderators.insert(user)
    }

    pub fn remove_moderator(&mut self, user: PrincipalId) -> bool {
        self.moderators.remove(&user)
    }

    pub fn is_moderator(&self, user: PrincipalId) -> bool {
        self.moderators.contains(&user)
    }
}

impl Entity for Organisation {
    type Id = OrganisationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
