use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribunal_catalog::FieldKind;
use tribunal_core::{
    AnswerId, AppealId, DomainError, Entity, FieldId, OrganisationId, PrincipalId, ResponseId,
    TemplateId,
};

/// A binding decision code. Opaque positive integer; 0 is reserved for
/// "no decision" and cannot be represented here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DecisionCode(u8);

impl DecisionCode {
    pub fn new(code: u8) -> Result<Self, DomainError> {
        if code == 0 {
            return Err(DomainError::validation("decision code must be positive"));
        }
        Ok(Self(code))
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DecisionCode {
    type Error = DomainError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<DecisionCode> for u8 {
    fn from(code: DecisionCode) -> Self {
        code.0
    }
}

/// Lifecycle state of an appeal. `Decided` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CaseStatus {
    Open,
    Decided(DecisionCode),
}

impl CaseStatus {
    /// Wire/storage representation: 0 = open, otherwise the decision code.
    pub fn as_code(&self) -> u8 {
        match self {
            CaseStatus::Open => 0,
            CaseStatus::Decided(code) => code.as_u8(),
        }
    }

    pub fn from_code(code: u8) -> Self {
        match DecisionCode::new(code) {
            Ok(code) => CaseStatus::Decided(code),
            Err(_) => CaseStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, CaseStatus::Open)
    }
}

impl TryFrom<u8> for CaseStatus {
    type Error = DomainError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(Self::from_code(code))
    }
}

impl From<CaseStatus> for u8 {
    fn from(status: CaseStatus) -> Self {
        status.as_code()
    }
}

/// One submitted instance of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub id: AppealId,
    pub organisation: OrganisationId,
    pub template: TemplateId,
    pub creator: PrincipalId,
    pub content: serde_json::Value,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appeal {
    pub fn open(
        organisation: OrganisationId,
        template: TemplateId,
        creator: PrincipalId,
        content: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AppealId::new(),
            organisation,
            template,
            creator,
            content,
            status: CaseStatus::Open,
            created_at: now,
            deleted_at: None,
        }
    }

    /// Transition `Open` → `Decided(code)`. Conflicts once decided; no
    /// transition ever leaves a decided case.
    pub fn decide(&mut self, code: DecisionCode) -> Result<(), DomainError> {
        if !self.status.is_open() {
            return Err(DomainError::conflict("appeal is already decided"));
        }
        self.status = CaseStatus::Decided(code);
        Ok(())
    }
}

impl Entity for Appeal {
    type Id = AppealId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A per-field answer captured when a case is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealAnswer {
    pub id: AnswerId,
    pub appeal: AppealId,
    pub field: FieldId,
    pub kind: FieldKind,
    pub content: String,
}

/// A moderator's (or the creator's) message against a case, optionally
/// carrying a binding decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealResponse {
    pub id: ResponseId,
    pub appeal: AppealId,
    pub author: PrincipalId,
    pub content: String,
    pub decision: Option<DecisionCode>,
    pub created_at: DateTime<Utc>,
}

impl AppealResponse {
    pub fn new(
        appeal: AppealId,
        author: PrincipalId,
        content: String,
        decision: Option<DecisionCode>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ResponseId::new(),
            appeal,
            author,
            content,
            decision,
            created_at: now,
        }
    }
}

/// Input for creating a case.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseDraft {
    pub template: TemplateId,
    pub content: serde_json::Value,
    #[serde(default)]
    pub answers: Vec<AnswerDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerDraft {
    pub field: FieldId,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_code_rejects_zero() {
        assert!(DecisionCode::new(0).is_err());
        assert_eq!(DecisionCode::new(2).unwrap().as_u8(), 2);
    }

    #[test]
    fn status_code_round_trip() {
        assert_eq!(CaseStatus::from_code(0), CaseStatus::Open);
        assert_eq!(
            CaseStatus::from_code(1),
            CaseStatus::Decided(DecisionCode::new(1).unwrap())
        );
        assert_eq!(CaseStatus::from_code(1).as_code(), 1);
        assert_eq!(CaseStatus::Open.as_code(), 0);
    }

    #[test]
    fn decide_is_terminal() {
        let mut appeal = Appeal::open(
            OrganisationId::new(),
            TemplateId::new(),
            PrincipalId::new(),
            serde_json::json!({"reason": "mistaken identity"}),
            Utc::now(),
        );

        appeal.decide(DecisionCode::new(1).unwrap()).unwrap();
        assert_eq!(appeal.status.as_code(), 1);

        let second = appeal.decide(DecisionCode::new(2).unwrap());
        assert!(second.is_err());
        assert_eq!(appeal.status.as_code(), 1);
    }

    proptest::proptest! {
        /// However many decisions are attempted, exactly the first one
        /// sticks and the status never changes afterwards.
        #[test]
        fn at_most_one_decision_applies(codes in proptest::collection::vec(1u8..=255, 1..20)) {
            let mut appeal = Appeal::open(
                OrganisationId::new(),
                TemplateId::new(),
                PrincipalId::new(),
                serde_json::Value::Null,
                Utc::now(),
            );

            let mut applied = 0usize;
            for code in &codes {
                if appeal.decide(DecisionCode::new(*code).unwrap()).is_ok() {
                    applied += 1;
                }
            }

            proptest::prop_assert_eq!(applied, 1);
            proptest::prop_assert_eq!(appeal.status.as_code(), codes[0]);
        }
    }
}
