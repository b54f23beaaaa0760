use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use tribunal_core::{AppealId, DomainError, PrincipalId};

use crate::appeal::{AppealResponse, DecisionCode};
use crate::store::{AppealStore, DecisionApplied, ResponseStore};

/// What happened to the parent appeal's status when a response was recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Plain commentary; no decision was carried.
    NotADecision,
    /// The response's decision closed the case.
    Applied,
    /// The case was already decided; the response was recorded but the
    /// standing decision was left untouched (re-decision is rejected, not
    /// overwritten).
    AlreadyDecided,
}

/// Records responses against a case and applies binding decisions.
pub struct ResponseProcessor {
    appeals: Arc<dyn AppealStore>,
    responses: Arc<dyn ResponseStore>,
}

impl ResponseProcessor {
    pub fn new(appeals: Arc<dyn AppealStore>, responses: Arc<dyn ResponseStore>) -> Self {
        Self { appeals, responses }
    }

    /// Record a response. The response row is persisted unconditionally
    /// (commentary is welcome on decided cases too, audit-trail semantics)
    /// and is returned to the caller whatever happens to the status.
    ///
    /// If `decision` is set, the parent appeal is moved `Open` →
    /// `Decided(code)` through a compare-and-set; when the case is already
    /// decided the transition is rejected and surfaced as
    /// [`DecisionOutcome::AlreadyDecided`].
    pub async fn add_response(
        &self,
        appeal: AppealId,
        author: PrincipalId,
        content: String,
        decision: Option<DecisionCode>,
    ) -> Result<(AppealResponse, DecisionOutcome), DomainError> {
        self.appeals
            .get_by_id(appeal)
            .await?
            .ok_or_else(|| DomainError::not_found("appeal"))?;

        let response = self
            .responses
            .insert(AppealResponse::new(
                appeal,
                author,
                content,
                decision,
                Utc::now(),
            ))
            .await?;

        let outcome = match decision {
            None => DecisionOutcome::NotADecision,
            Some(code) => match self.appeals.decide(appeal, code).await? {
                DecisionApplied::Applied => DecisionOutcome::Applied,
                DecisionApplied::AlreadyDecided => {
                    tracing::info!(%appeal, code = code.as_u8(), "decision ignored, appeal already decided");
                    DecisionOutcome::AlreadyDecided
                }
            },
        };

        Ok((response, outcome))
    }

    pub async fn responses_for(
        &self,
        appeal: AppealId,
    ) -> Result<Vec<AppealResponse>, DomainError> {
        self.responses.list_for_appeal(appeal).await
    }
}
