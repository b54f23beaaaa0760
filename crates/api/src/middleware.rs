use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, middleware::Next, response::Response};
use chrono::Utc;

use tribunal_auth::CredentialService;

use crate::app::errors::{missing_token_response, token_error_response};
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub credentials: Arc<CredentialService>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(response) => return response,
    };

    let claims = match state.credentials.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => return token_error_response(e),
    };

    req.extensions_mut().insert(PrincipalContext::new(claims));

    next.run(req).await
}

pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, Response> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing_token_response)?;

    let header = header.to_str().map_err(|_| missing_token_response())?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(missing_token_response)?
        .trim();
    if token.is_empty() {
        return Err(missing_token_response());
    }

    Ok(token)
}
