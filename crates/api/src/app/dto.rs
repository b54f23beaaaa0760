//! Request DTOs and JSON mapping helpers.
//!
//! Domain entities already serialize cleanly (credentials are skipped on
//! principals, statuses flatten to their wire codes); the helpers here only
//! add derived data a client expects in one round-trip.

use serde::Deserialize;
use serde_json::{Value, json};

use tribunal_registry::{Appeal, AppealAnswer, AppealResponse, DecisionOutcome};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub content: String,
    /// 0 (or absent) = commentary; any positive value is a binding decision.
    #[serde(default)]
    pub decision: u8,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

pub fn appeal_detail_json(
    appeal: &Appeal,
    answers: &[AppealAnswer],
    responses: &[AppealResponse],
) -> Value {
    json!({
        "appeal": appeal,
        "answers": answers,
        "responses": responses,
    })
}

pub fn response_with_outcome_json(response: &AppealResponse, outcome: DecisionOutcome) -> Value {
    json!({
        "response": response,
        "decision_outcome": outcome,
    })
}
