use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
};
use serde_json::json;

use tribunal_core::{OrganisationId, PrincipalId};
use tribunal_directory::{OrganisationDraft, OrganisationPatch};

use crate::app::errors::{domain_error_response, respond};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/organisations", get(list))
        .route("/api/organisations/create", post(create))
        .route("/api/organisations/byuser/:user_id", get(list_by_owner))
        .route("/api/organisations/:id", get(get_one))
        .route("/api/organisations/:id/update", put(update))
        .route("/api/organisations/:id/delete", delete(delete_one))
        .route("/api/organisations/:id/moderators/:user_id/add", post(add_moderator))
        .route(
            "/api/organisations/:id/moderators/:user_id/remove",
            delete(remove_moderator),
        )
}

async fn list(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.directory.list_organisations().await {
        Ok(organisations) => respond(StatusCode::OK, json!(organisations)),
        Err(e) => domain_error_response(e),
    }
}

async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<OrganisationId>,
) -> Response {
    match services.directory.get_organisation(id).await {
        Ok(organisation) => respond(StatusCode::OK, json!(organisation)),
        Err(e) => domain_error_response(e),
    }
}

async fn list_by_owner(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<PrincipalId>,
) -> Response {
    match services.directory.organisations_by_owner(user_id).await {
        Ok(organisations) => respond(StatusCode::OK, json!(organisations)),
        Err(e) => domain_error_response(e),
    }
}

async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<OrganisationDraft>,
) -> Response {
    match services
        .directory
        .create_organisation(principal.claims(), draft)
        .await
    {
        Ok(organisation) => respond(StatusCode::OK, json!(organisation)),
        Err(e) => domain_error_response(e),
    }
}

async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<OrganisationId>,
    Json(patch): Json<OrganisationPatch>,
) -> Response {
    match services
        .directory
        .update_organisation(id, principal.claims(), patch)
        .await
    {
        Ok(organisation) => respond(StatusCode::OK, json!(organisation)),
        Err(e) => domain_error_response(e),
    }
}

async fn delete_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<OrganisationId>,
) -> Response {
    match services
        .directory
        .delete_organisation(id, principal.claims())
        .await
    {
        Ok(()) => respond(StatusCode::OK, json!("organisation deleted")),
        Err(e) => domain_error_response(e),
    }
}

async fn add_moderator(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, user_id)): Path<(OrganisationId, PrincipalId)>,
) -> Response {
    match services
        .directory
        .add_moderator(id, principal.claims(), user_id)
        .await
    {
        Ok(()) => respond(
            StatusCode::OK,
            json!(format!("user '{user_id}' added to the moderators list")),
        ),
        Err(e) => domain_error_response(e),
    }
}

async fn remove_moderator(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, user_id)): Path<(OrganisationId, PrincipalId)>,
) -> Response {
    match services
        .directory
        .remove_moderator(id, principal.claims(), user_id)
        .await
    {
        Ok(()) => respond(
            StatusCode::OK,
            json!(format!("user '{user_id}' removed from the moderators list")),
        ),
        Err(e) => domain_error_response(e),
    }
}
