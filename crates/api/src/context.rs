use tribunal_auth::Claims;
use tribunal_core::PrincipalId;

/// Authenticated principal context for a request.
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: Claims,
}

impl PrincipalContext {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.claims.principal_id
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}
