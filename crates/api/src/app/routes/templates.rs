use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
};
use serde_json::json;

use tribunal_catalog::TemplateDraft;
use tribunal_core::{OrganisationId, TemplateId};

use crate::app::errors::{domain_error_response, respond};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/appeals/:organisation_id/templates", get(list))
        .route("/api/appeals/:organisation_id/templates/create", post(create))
        .route("/api/appeals/:organisation_id/templates/:template_id", get(get_one))
        .route(
            "/api/appeals/:organisation_id/templates/:template_id/update",
            put(update),
        )
        .route(
            "/api/appeals/:organisation_id/templates/:template_id/delete",
            delete(delete_one),
        )
}

async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Path(organisation_id): Path<OrganisationId>,
) -> Response {
    match services.catalog.list(organisation_id).await {
        Ok(templates) => respond(StatusCode::OK, json!(templates)),
        Err(e) => domain_error_response(e),
    }
}

async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Path((organisation_id, template_id)): Path<(OrganisationId, TemplateId)>,
) -> Response {
    match services.catalog.get(organisation_id, template_id).await {
        Ok(template) => respond(StatusCode::OK, json!(template)),
        Err(e) => domain_error_response(e),
    }
}

async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(organisation_id): Path<OrganisationId>,
    Json(draft): Json<TemplateDraft>,
) -> Response {
    match services
        .catalog
        .create(organisation_id, principal.claims(), draft)
        .await
    {
        Ok(template) => respond(StatusCode::OK, json!(template)),
        Err(e) => domain_error_response(e),
    }
}

async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((organisation_id, template_id)): Path<(OrganisationId, TemplateId)>,
    Json(draft): Json<TemplateDraft>,
) -> Response {
    match services
        .catalog
        .update(organisation_id, template_id, principal.claims(), draft)
        .await
    {
        Ok(template) => respond(StatusCode::OK, json!(template)),
        Err(e) => domain_error_response(e),
    }
}

async fn delete_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((organisation_id, template_id)): Path<(OrganisationId, TemplateId)>,
) -> Response {
    match services
        .catalog
        .delete(organisation_id, template_id, principal.claims())
        .await
    {
        Ok(()) => respond(StatusCode::OK, json!("template deleted")),
        Err(e) => domain_error_response(e),
    }
}
