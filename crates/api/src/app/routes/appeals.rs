use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use serde_json::json;

use tribunal_core::{AppealId, OrganisationId};
use tribunal_registry::{CaseDraft, DecisionCode};

use crate::app::dto::{RespondRequest, appeal_detail_json, response_with_outcome_json};
use crate::app::errors::{domain_error_response, respond};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/appeals/:organisation_id", get(list))
        .route("/api/appeals/:organisation_id/create", post(create))
        .route("/api/appeals/:organisation_id/:appeal_id", get(get_one))
        .route(
            "/api/appeals/:organisation_id/:appeal_id/respond",
            post(add_response),
        )
}

async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Path(organisation_id): Path<OrganisationId>,
) -> Response {
    match services.registry.list_cases(organisation_id).await {
        Ok(appeals) => respond(StatusCode::OK, json!(appeals)),
        Err(e) => domain_error_response(e),
    }
}

async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Path((organisation_id, appeal_id)): Path<(OrganisationId, AppealId)>,
) -> Response {
    let appeal = match services.registry.get_case(organisation_id, appeal_id).await {
        Ok(appeal) => appeal,
        Err(e) => return domain_error_response(e),
    };

    let answers = match services.registry.case_answers(appeal_id).await {
        Ok(answers) => answers,
        Err(e) => return domain_error_response(e),
    };

    let responses = match services.processor.responses_for(appeal_id).await {
        Ok(responses) => responses,
        Err(e) => return domain_error_response(e),
    };

    respond(
        StatusCode::OK,
        appeal_detail_json(&appeal, &answers, &responses),
    )
}

async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(organisation_id): Path<OrganisationId>,
    Json(draft): Json<CaseDraft>,
) -> Response {
    match services
        .registry
        .create_case(organisation_id, principal.principal_id(), draft)
        .await
    {
        Ok(appeal) => respond(StatusCode::OK, json!(appeal)),
        Err(e) => domain_error_response(e),
    }
}

async fn add_response(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((organisation_id, appeal_id)): Path<(OrganisationId, AppealId)>,
    Json(body): Json<RespondRequest>,
) -> Response {
    // Scope check first: an appeal of another organisation must be
    // indistinguishable from a missing one.
    if let Err(e) = services.registry.get_case(organisation_id, appeal_id).await {
        return domain_error_response(e);
    }

    let decision = if body.decision == 0 {
        None
    } else {
        match DecisionCode::new(body.decision) {
            Ok(code) => Some(code),
            Err(e) => return domain_error_response(e),
        }
    };

    match services
        .processor
        .add_response(appeal_id, principal.principal_id(), body.content, decision)
        .await
    {
        Ok((response, outcome)) => respond(
            StatusCode::OK,
            response_with_outcome_json(&response, outcome),
        ),
        Err(e) => domain_error_response(e),
    }
}
