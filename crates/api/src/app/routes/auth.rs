use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use tribunal_directory::{Directory, ExternalIdentity};

use crate::app::dto::{CallbackQuery, LoginRequest, RegisterRequest};
use crate::app::errors::{domain_error_response, json_error, respond, token_error_response};
use crate::app::services::AppServices;
use crate::middleware::extract_bearer;

pub fn router() -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/discord", get(discord_redirect))
        .route("/api/auth/callback", get(callback))
}

async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    match services.directory.register(&body.email, &body.password).await {
        Ok(_) => respond(StatusCode::OK, json!("account registered")),
        Err(e) => domain_error_response(e),
    }
}

async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let principal = match services.directory.login(&body.email, &body.password).await {
        Ok(p) => p,
        Err(e) => return domain_error_response(e),
    };

    match services
        .credentials
        .issue(&Directory::token_principal(&principal), Utc::now())
    {
        Ok(issued) => respond(StatusCode::OK, json!(issued)),
        Err(e) => token_error_response(e),
    }
}

/// Re-validates the presented token and hands back a fresh one. Expired
/// tokens are refused; log in again instead.
async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> Response {
    let token = match extract_bearer(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };

    match services.credentials.refresh(token, Utc::now()) {
        Ok(issued) => respond(StatusCode::OK, json!(issued)),
        Err(e) => token_error_response(e),
    }
}

async fn discord_redirect(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match &services.identity {
        Some(provider) => {
            Redirect::temporary(&provider.authorize_url(&services.oauth_state)).into_response()
        }
        None => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "provider_not_configured",
            "external login is not configured",
        ),
    }
}

async fn callback(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(provider) = &services.identity else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "provider_not_configured",
            "external login is not configured",
        );
    };

    if query.state != services.oauth_state {
        return json_error(StatusCode::BAD_REQUEST, "state_mismatch", "state does not match");
    }

    let identity = match provider.exchange(&query.code).await {
        Ok(identity) => identity,
        Err(e) => return domain_error_response(e),
    };

    let principal = match services
        .directory
        .register_external(
            &identity.email,
            ExternalIdentity {
                provider: provider.provider_name().to_string(),
                subject: identity.subject,
            },
        )
        .await
    {
        Ok(p) => p,
        Err(e) => return domain_error_response(e),
    };

    match services
        .credentials
        .issue(&Directory::token_principal(&principal), Utc::now())
    {
        Ok(issued) => respond(StatusCode::OK, json!(issued)),
        Err(e) => token_error_response(e),
    }
}
