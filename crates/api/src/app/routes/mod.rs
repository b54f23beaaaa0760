//! HTTP routes + handlers (one file per domain area).

use axum::Router;

pub mod appeals;
pub mod auth;
pub mod organisations;
pub mod templates;

/// Routes reachable without a bearer token.
pub fn public_router() -> Router {
    auth::router()
}

/// Routes behind the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .merge(organisations::router())
        .merge(templates::router())
        .merge(appeals::router())
}
