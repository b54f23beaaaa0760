use std::sync::Arc;

use tribunal_auth::Claims;
use tribunal_core::OrganisationId;

use crate::store::OrganisationStore;

/// Authorization predicate gating organisation-scoped mutations.
///
/// Evaluated fresh on every mutating call; ownership can change between
/// requests, so the answer is never cached.
#[derive(Clone)]
pub struct ManagementGuard {
    organisations: Arc<dyn OrganisationStore>,
}

impl ManagementGuard {
    pub fn new(organisations: Arc<dyn OrganisationStore>) -> Self {
        Self { organisations }
    }

    /// True iff the caller owns the organisation or is a global admin.
    ///
    /// A missing organisation (or a storage failure) answers `false` rather
    /// than raising: the predicate's only job is to deny. Moderators are
    /// deliberately not managers.
    pub async fn can_manage(&self, organisation: OrganisationId, claims: &Claims) -> bool {
        match self.organisations.get(organisation).await {
            Ok(Some(org)) => org.owner == claims.principal_id || claims.global_admin,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(%organisation, error = %e, "management check failed to load organisation");
                false
            }
        }
    }
}
