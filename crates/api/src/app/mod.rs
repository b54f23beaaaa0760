//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: store selection + domain service construction
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses (`{status, body}` envelope)

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Router, routing::get};
use serde_json::json;
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(&config).await?);

    let auth_state = middleware::AuthState {
        credentials: services.credentials.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::protected_router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let public = routes::public_router().layer(Extension(services));

    Ok(Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(protected)
        .fallback(not_found)
        .layer(ServiceBuilder::new()))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> Response {
    errors::respond(
        StatusCode::NOT_FOUND,
        json!({
            "error": "not_found",
            "message": "no such endpoint",
        }),
    )
}
