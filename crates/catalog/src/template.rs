use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribunal_core::{DomainError, Entity, FieldId, OrganisationId, TemplateId};

/// What kind of input a template field collects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ShortText,
    LongText,
    Number,
    Checkbox,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::ShortText => "short_text",
            FieldKind::LongText => "long_text",
            FieldKind::Number => "number",
            FieldKind::Checkbox => "checkbox",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "short_text" => Ok(FieldKind::ShortText),
            "long_text" => Ok(FieldKind::LongText),
            "number" => Ok(FieldKind::Number),
            "checkbox" => Ok(FieldKind::Checkbox),
            other => Err(DomainError::validation(format!(
                "unknown field kind '{other}'"
            ))),
        }
    }
}

/// One input of an appeal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    pub id: FieldId,
    pub title: String,
    pub kind: FieldKind,
    pub character_limit: u32,
    pub description: String,
    pub placeholder: String,
}

impl Entity for TemplateField {
    type Id = FieldId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A form definition appeals are created against.
///
/// Fields are owned by exactly one template; a replace-set update fully
/// supersedes the previous field list (see `TemplateCatalog::update`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealTemplate {
    pub id: TemplateId,
    pub organisation: OrganisationId,
    pub name: String,
    pub fields: Vec<TemplateField>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating or replace-updating a template.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDraft {
    pub title: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub character_limit: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub placeholder: String,
}

impl AppealTemplate {
    pub fn create(
        draft: TemplateDraft,
        organisation: OrganisationId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("template name cannot be empty"));
        }

        Ok(Self {
            id: TemplateId::new(),
            organisation,
            name,
            fields: materialize_fields(draft.fields)?,
            created_at: now,
            deleted_at: None,
        })
    }

    /// Replace-set: the new list fully supersedes the old one; prior field
    /// ids do not survive.
    pub fn replace(&mut self, draft: TemplateDraft) -> Result<(), DomainError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("template name cannot be empty"));
        }
        self.name = name;
        self.fields = materialize_fields(draft.fields)?;
        Ok(())
    }

    pub fn field(&self, id: FieldId) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.id == id)
    }
}

fn materialize_fields(drafts: Vec<FieldDraft>) -> Result<Vec<TemplateField>, DomainError> {
    drafts
        .into_iter()
        .map(|d| {
            let title = d.title.trim().to_string();
            if title.is_empty() {
                return Err(DomainError::validation("field title cannot be empty"));
            }
            Ok(TemplateField {
                id: FieldId::new(),
                title,
                kind: d.kind,
                character_limit: d.character_limit,
                description: d.description,
                placeholder: d.placeholder,
            })
        })
        .collect()
}

impl Entity for AppealTemplate {
    type Id = TemplateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, titles: &[&str]) -> TemplateDraft {
        TemplateDraft {
            name: name.to_string(),
            fields: titles
                .iter()
                .map(|t| FieldDraft {
                    title: t.to_string(),
                    kind: FieldKind::ShortText,
                    character_limit: 200,
                    description: String::new(),
                    placeholder: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn create_assigns_field_ids() {
        let t = AppealTemplate::create(
            draft("Ban Appeal", &["Why were you banned?", "Why should we unban you?"]),
            OrganisationId::new(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(t.fields.len(), 2);
        assert_ne!(t.fields[0].id, t.fields[1].id);
    }

    #[test]
    fn replace_supersedes_prior_fields() {
        let mut t = AppealTemplate::create(
            draft("Ban Appeal", &["Old question"]),
            OrganisationId::new(),
            Utc::now(),
        )
        .unwrap();
        let old_field = t.fields[0].id;

        t.replace(draft("Ban Appeal v2", &["New question"])).unwrap();

        assert_eq!(t.name, "Ban Appeal v2");
        assert_eq!(t.fields.len(), 1);
        assert!(t.field(old_field).is_none());
    }

    #[test]
    fn blank_names_rejected() {
        assert!(AppealTemplate::create(draft(" ", &[]), OrganisationId::new(), Utc::now()).is_err());

        let mut t =
            AppealTemplate::create(draft("ok", &[]), OrganisationId::new(), Utc::now()).unwrap();
        assert!(t.replace(draft("", &[])).is_err());
    }

    #[test]
    fn field_kind_parses_round_trip() {
        for kind in [
            FieldKind::ShortText,
            FieldKind::LongText,
            FieldKind::Number,
            FieldKind::Checkbox,
        ] {
            assert_eq!(FieldKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(FieldKind::parse("dropdown").is_err());
    }
}
