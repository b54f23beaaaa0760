//! Postgres-backed store (sqlx).
//!
//! Tenant/entity scoping is part of every WHERE clause; multi-entity
//! operations run inside explicit transactions. Driver errors are logged
//! here and surface to callers as `DomainError::Unavailable`; clients
//! never see storage error text.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tribunal_catalog::{AppealTemplate, FieldKind, TemplateField, TemplateStore};
use tribunal_core::{
    AnswerId, AppealId, DomainError, FieldId, OrganisationId, PrincipalId, ResponseId, TemplateId,
};
use tribunal_directory::{
    ExternalIdentity, Organisation, OrganisationStore, PlanTier, Principal, PrincipalStore,
};
use tribunal_registry::{
    Appeal, AppealAnswer, AppealResponse, AppealStore, CaseStatus, DecisionApplied, DecisionCode,
    ResponseStore,
};

const SCHEMA: &str = include_str!("../schema.sql");

/// How long a request waits for a pooled connection before the operation
/// surfaces as retryable `Unavailable`.
const ACQUIRE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(unavailable("connect"))?;
        Ok(Self { pool })
    }

    /// Apply the schema (idempotent).
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(unavailable("migrate"))?;
        Ok(())
    }

    async fn fetch_fields(&self, template: TemplateId) -> Result<Vec<TemplateField>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, kind, character_limit, description, placeholder
            FROM template_fields
            WHERE template = $1
            ORDER BY position
            "#,
        )
        .bind(template.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("fetch template fields"))?;

        rows.into_iter().map(|r| map_field(&r)).collect()
    }
}

fn unavailable(op: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| {
        tracing::error!(error = %e, operation = op, "storage operation failed");
        DomainError::Unavailable
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::ForeignKeyViolation)
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn map_principal(row: &PgRow) -> Result<Principal, DomainError> {
    let decode = unavailable("decode principal row");

    let provider: Option<String> = row.try_get("external_provider").map_err(&decode)?;
    let subject: Option<String> = row.try_get("external_subject").map_err(&decode)?;
    let external_identity = match (provider, subject) {
        (Some(provider), Some(subject)) => Some(ExternalIdentity { provider, subject }),
        _ => None,
    };

    Ok(Principal {
        id: PrincipalId::from_uuid(row.try_get::<Uuid, _>("id").map_err(&decode)?),
        email: row.try_get("email").map_err(&decode)?,
        password_hash: row.try_get("password_hash").map_err(&decode)?,
        external_identity,
        global_admin: row.try_get("global_admin").map_err(&decode)?,
        plan_tier: PlanTier(row.try_get::<i16, _>("plan_tier").map_err(&decode)? as u8),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&decode)?,
        deleted_at: row.try_get("deleted_at").map_err(&decode)?,
    })
}

fn map_organisation(row: &PgRow) -> Result<Organisation, DomainError> {
    let decode = unavailable("decode organisation row");

    let moderators: Vec<Uuid> = row.try_get("moderators").map_err(&decode)?;

    Ok(Organisation {
        id: OrganisationId::from_uuid(row.try_get::<Uuid, _>("id").map_err(&decode)?),
        name: row.try_get("name").map_err(&decode)?,
        url: row.try_get("url").map_err(&decode)?,
        description: row.try_get("description").map_err(&decode)?,
        icon_hash: row.try_get("icon_hash").map_err(&decode)?,
        owner: PrincipalId::from_uuid(row.try_get::<Uuid, _>("owner").map_err(&decode)?),
        moderators: moderators
            .into_iter()
            .map(PrincipalId::from_uuid)
            .collect::<HashSet<_>>(),
        verified: row.try_get("verified").map_err(&decode)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&decode)?,
        deleted_at: row.try_get("deleted_at").map_err(&decode)?,
    })
}

fn map_field(row: &PgRow) -> Result<TemplateField, DomainError> {
    let decode = unavailable("decode template field row");

    Ok(TemplateField {
        id: FieldId::from_uuid(row.try_get::<Uuid, _>("id").map_err(&decode)?),
        title: row.try_get("title").map_err(&decode)?,
        kind: FieldKind::parse(&row.try_get::<String, _>("kind").map_err(&decode)?)?,
        character_limit: row.try_get::<i32, _>("character_limit").map_err(&decode)? as u32,
        description: row.try_get("description").map_err(&decode)?,
        placeholder: row.try_get("placeholder").map_err(&decode)?,
    })
}

fn map_template(row: &PgRow, fields: Vec<TemplateField>) -> Result<AppealTemplate, DomainError> {
    let decode = unavailable("decode template row");

    Ok(AppealTemplate {
        id: TemplateId::from_uuid(row.try_get::<Uuid, _>("id").map_err(&decode)?),
        organisation: OrganisationId::from_uuid(
            row.try_get::<Uuid, _>("organisation").map_err(&decode)?,
        ),
        name: row.try_get("name").map_err(&decode)?,
        fields,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&decode)?,
        deleted_at: row.try_get("deleted_at").map_err(&decode)?,
    })
}

fn map_appeal(row: &PgRow) -> Result<Appeal, DomainError> {
    let decode = unavailable("decode appeal row");

    Ok(Appeal {
        id: AppealId::from_uuid(row.try_get::<Uuid, _>("id").map_err(&decode)?),
        organisation: OrganisationId::from_uuid(
            row.try_get::<Uuid, _>("organisation").map_err(&decode)?,
        ),
        template: TemplateId::from_uuid(row.try_get::<Uuid, _>("template").map_err(&decode)?),
        creator: PrincipalId::from_uuid(row.try_get::<Uuid, _>("creator").map_err(&decode)?),
        content: row.try_get::<serde_json::Value, _>("content").map_err(&decode)?,
        status: CaseStatus::from_code(row.try_get::<i16, _>("status").map_err(&decode)? as u8),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&decode)?,
        deleted_at: row.try_get("deleted_at").map_err(&decode)?,
    })
}

fn map_answer(row: &PgRow) -> Result<AppealAnswer, DomainError> {
    let decode = unavailable("decode appeal answer row");

    Ok(AppealAnswer {
        id: AnswerId::from_uuid(row.try_get::<Uuid, _>("id").map_err(&decode)?),
        appeal: AppealId::from_uuid(row.try_get::<Uuid, _>("appeal").map_err(&decode)?),
        field: FieldId::from_uuid(row.try_get::<Uuid, _>("field").map_err(&decode)?),
        kind: FieldKind::parse(&row.try_get::<String, _>("kind").map_err(&decode)?)?,
        content: row.try_get("content").map_err(&decode)?,
    })
}

fn map_response(row: &PgRow) -> Result<AppealResponse, DomainError> {
    let decode = unavailable("decode appeal response row");

    let decision: Option<i16> = row.try_get("decision").map_err(&decode)?;

    Ok(AppealResponse {
        id: ResponseId::from_uuid(row.try_get::<Uuid, _>("id").map_err(&decode)?),
        appeal: AppealId::from_uuid(row.try_get::<Uuid, _>("appeal").map_err(&decode)?),
        author: PrincipalId::from_uuid(row.try_get::<Uuid, _>("author").map_err(&decode)?),
        content: row.try_get("content").map_err(&decode)?,
        decision: decision.and_then(|d| DecisionCode::new(d as u8).ok()),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(&decode)?,
    })
}

const ORGANISATION_COLUMNS: &str = r#"
    id, name, url, description, icon_hash, owner, verified, created_at, deleted_at,
    ARRAY(
        SELECT m.principal FROM organisation_moderators m WHERE m.organisation = o.id
    ) AS moderators
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Principals
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PrincipalStore for PostgresStore {
    async fn insert(&self, principal: Principal) -> Result<Principal, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO principals (
                id, email, password_hash, external_provider, external_subject,
                global_admin, plan_tier, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(principal.id.as_uuid())
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.external_identity.as_ref().map(|e| e.provider.as_str()))
        .bind(principal.external_identity.as_ref().map(|e| e.subject.as_str()))
        .bind(principal.global_admin)
        .bind(principal.plan_tier.as_u8() as i16)
        .bind(principal.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(principal),
            Err(e) if is_unique_violation(&e) => {
                Err(DomainError::conflict("email already registered"))
            }
            Err(e) => Err(unavailable("insert principal")(e)),
        }
    }

    async fn get(&self, id: PrincipalId) -> Result<Option<Principal>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, external_provider, external_subject,
                   global_admin, plan_tier, created_at, deleted_at
            FROM principals
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("get principal"))?;

        row.as_ref().map(map_principal).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, external_provider, external_subject,
                   global_admin, plan_tier, created_at, deleted_at
            FROM principals
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("find principal by email"))?;

        row.as_ref().map(map_principal).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Organisations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrganisationStore for PostgresStore {
    async fn insert(&self, organisation: Organisation) -> Result<Organisation, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO organisations (
                id, name, url, description, icon_hash, owner, verified, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(organisation.id.as_uuid())
        .bind(&organisation.name)
        .bind(&organisation.url)
        .bind(&organisation.description)
        .bind(&organisation.icon_hash)
        .bind(organisation.owner.as_uuid())
        .bind(organisation.verified)
        .bind(organisation.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(organisation),
            Err(e) if is_unique_violation(&e) => {
                Err(DomainError::conflict("organisation url already taken"))
            }
            Err(e) => Err(unavailable("insert organisation")(e)),
        }
    }

    async fn get(&self, id: OrganisationId) -> Result<Option<Organisation>, DomainError> {
        let sql = format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations o WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable("get organisation"))?;

        row.as_ref().map(map_organisation).transpose()
    }

    async fn list(&self) -> Result<Vec<Organisation>, DomainError> {
        let sql = format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations o WHERE deleted_at IS NULL ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable("list organisations"))?;

        rows.iter().map(map_organisation).collect()
    }

    async fn list_by_owner(&self, owner: PrincipalId) -> Result<Vec<Organisation>, DomainError> {
        let sql = format!(
            "SELECT {ORGANISATION_COLUMNS} FROM organisations o WHERE owner = $1 AND deleted_at IS NULL ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(owner.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable("list organisations by owner"))?;

        rows.iter().map(map_organisation).collect()
    }

    async fn update(&self, organisation: Organisation) -> Result<Organisation, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE organisations
            SET name = $2, description = $3, icon_hash = $4, verified = $5
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(organisation.id.as_uuid())
        .bind(&organisation.name)
        .bind(&organisation.description)
        .bind(&organisation.icon_hash)
        .bind(organisation.verified)
        .execute(&self.pool)
        .await
        .map_err(unavailable("update organisation"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("organisation"));
        }
        Ok(organisation)
    }

    async fn delete_cascade(&self, id: OrganisationId) -> Result<(), DomainError> {
        let err = unavailable("delete organisation cascade");
        let mut tx = self.pool.begin().await.map_err(&err)?;

        let exists = sqlx::query("SELECT 1 FROM organisations WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(&err)?;
        if exists.is_none() {
            return Err(DomainError::not_found("organisation"));
        }

        // Leaves first: answers, responses, appeals, fields, templates,
        // moderator links, then the organisation row.
        sqlx::query(
            "DELETE FROM appeal_answers WHERE appeal IN (SELECT id FROM appeals WHERE organisation = $1)",
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(&err)?;

        sqlx::query(
            "DELETE FROM appeal_responses WHERE appeal IN (SELECT id FROM appeals WHERE organisation = $1)",
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(&err)?;

        sqlx::query("DELETE FROM appeals WHERE organisation = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        sqlx::query(
            "DELETE FROM template_fields WHERE template IN (SELECT id FROM templates WHERE organisation = $1)",
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(&err)?;

        sqlx::query("DELETE FROM templates WHERE organisation = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        sqlx::query("DELETE FROM organisation_moderators WHERE organisation = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        sqlx::query("DELETE FROM organisations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        tx.commit().await.map_err(&err)
    }

    async fn add_moderator(
        &self,
        id: OrganisationId,
        user: PrincipalId,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO organisation_moderators (organisation, principal)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => Err(DomainError::not_found("organisation")),
            Err(e) => Err(unavailable("add moderator")(e)),
        }
    }

    async fn remove_moderator(
        &self,
        id: OrganisationId,
        user: PrincipalId,
    ) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM organisation_moderators WHERE organisation = $1 AND principal = $2")
            .bind(id.as_uuid())
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(unavailable("remove moderator"))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Templates
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_fields(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    template: TemplateId,
    fields: &[TemplateField],
) -> Result<(), sqlx::Error> {
    for (position, field) in fields.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO template_fields (
                id, template, position, title, kind, character_limit, description, placeholder
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(field.id.as_uuid())
        .bind(template.as_uuid())
        .bind(position as i32)
        .bind(&field.title)
        .bind(field.kind.as_str())
        .bind(field.character_limit as i32)
        .bind(&field.description)
        .bind(&field.placeholder)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TemplateStore for PostgresStore {
    async fn insert(&self, template: AppealTemplate) -> Result<AppealTemplate, DomainError> {
        let err = unavailable("insert template");
        let mut tx = self.pool.begin().await.map_err(&err)?;

        sqlx::query(
            r#"
            INSERT INTO templates (id, organisation, name, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(template.id.as_uuid())
        .bind(template.organisation.as_uuid())
        .bind(&template.name)
        .bind(template.created_at)
        .execute(&mut *tx)
        .await
        .map_err(&err)?;

        insert_fields(&mut tx, template.id, &template.fields)
            .await
            .map_err(&err)?;

        tx.commit().await.map_err(&err)?;
        Ok(template)
    }

    async fn get(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
    ) -> Result<Option<AppealTemplate>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, organisation, name, created_at, deleted_at
            FROM templates
            WHERE id = $1 AND organisation = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(organisation.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("get template"))?;

        match row {
            Some(row) => {
                let fields = self.fetch_fields(id).await?;
                Ok(Some(map_template(&row, fields)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, organisation: OrganisationId) -> Result<Vec<AppealTemplate>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, organisation, name, created_at, deleted_at
            FROM templates
            WHERE organisation = $1 AND deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(organisation.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("list templates"))?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            let id = TemplateId::from_uuid(
                row.try_get::<Uuid, _>("id")
                    .map_err(unavailable("decode template row"))?,
            );
            let fields = self.fetch_fields(id).await?;
            templates.push(map_template(&row, fields)?);
        }
        Ok(templates)
    }

    async fn count_for_organisation(
        &self,
        organisation: OrganisationId,
    ) -> Result<usize, DomainError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM templates WHERE organisation = $1 AND deleted_at IS NULL",
        )
        .bind(organisation.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable("count templates"))?;

        let count: i64 = row
            .try_get("count")
            .map_err(unavailable("decode template count"))?;
        Ok(count as usize)
    }

    async fn update_replacing_fields(
        &self,
        template: AppealTemplate,
    ) -> Result<AppealTemplate, DomainError> {
        let err = unavailable("update template");
        let mut tx = self.pool.begin().await.map_err(&err)?;

        let updated = sqlx::query(
            r#"
            UPDATE templates
            SET name = $3
            WHERE id = $1 AND organisation = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(template.id.as_uuid())
        .bind(template.organisation.as_uuid())
        .bind(&template.name)
        .execute(&mut *tx)
        .await
        .map_err(&err)?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::not_found("template"));
        }

        // Replace-then-purge in one transaction: a concurrent reader sees
        // the old field set or the new one, never a partial union, and no
        // superseded field survives as an orphan.
        sqlx::query("DELETE FROM template_fields WHERE template = $1")
            .bind(template.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        insert_fields(&mut tx, template.id, &template.fields)
            .await
            .map_err(&err)?;

        tx.commit().await.map_err(&err)?;
        Ok(template)
    }

    async fn delete_cascade(
        &self,
        organisation: OrganisationId,
        id: TemplateId,
    ) -> Result<(), DomainError> {
        let err = unavailable("delete template cascade");
        let mut tx = self.pool.begin().await.map_err(&err)?;

        let exists =
            sqlx::query("SELECT 1 FROM templates WHERE id = $1 AND organisation = $2 FOR UPDATE")
                .bind(id.as_uuid())
                .bind(organisation.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(&err)?;
        if exists.is_none() {
            return Err(DomainError::not_found("template"));
        }

        sqlx::query(
            "DELETE FROM appeal_answers WHERE appeal IN (SELECT id FROM appeals WHERE template = $1)",
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(&err)?;

        sqlx::query(
            "DELETE FROM appeal_responses WHERE appeal IN (SELECT id FROM appeals WHERE template = $1)",
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(&err)?;

        sqlx::query("DELETE FROM appeals WHERE template = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        sqlx::query("DELETE FROM template_fields WHERE template = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(&err)?;

        tx.commit().await.map_err(&err)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Appeals & responses
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AppealStore for PostgresStore {
    async fn insert_open(
        &self,
        appeal: Appeal,
        answers: Vec<AppealAnswer>,
    ) -> Result<Appeal, DomainError> {
        let err = unavailable("insert appeal");
        let mut tx = self.pool.begin().await.map_err(&err)?;

        let open = sqlx::query(
            r#"
            SELECT id FROM appeals
            WHERE creator = $1 AND template = $2 AND status = 0
            FOR UPDATE
            "#,
        )
        .bind(appeal.creator.as_uuid())
        .bind(appeal.template.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(&err)?;
        if open.is_some() {
            return Err(DomainError::DuplicateOpenCase);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO appeals (id, organisation, template, creator, content, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(appeal.id.as_uuid())
        .bind(appeal.organisation.as_uuid())
        .bind(appeal.template.as_uuid())
        .bind(appeal.creator.as_uuid())
        .bind(&appeal.content)
        .bind(appeal.status.as_code() as i16)
        .bind(appeal.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // The partial unique index is the backstop for two transactions
            // that both read "no open case" before either committed.
            Err(e) if is_unique_violation(&e) => return Err(DomainError::DuplicateOpenCase),
            Err(e) => return Err(err(e)),
        }

        for answer in &answers {
            sqlx::query(
                r#"
                INSERT INTO appeal_answers (id, appeal, field, kind, content)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(answer.id.as_uuid())
            .bind(answer.appeal.as_uuid())
            .bind(answer.field.as_uuid())
            .bind(answer.kind.as_str())
            .bind(&answer.content)
            .execute(&mut *tx)
            .await
            .map_err(&err)?;
        }

        tx.commit().await.map_err(&err)?;
        Ok(appeal)
    }

    async fn get(
        &self,
        organisation: OrganisationId,
        id: AppealId,
    ) -> Result<Option<Appeal>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, organisation, template, creator, content, status, created_at, deleted_at
            FROM appeals
            WHERE id = $1 AND organisation = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(organisation.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("get appeal"))?;

        row.as_ref().map(map_appeal).transpose()
    }

    async fn get_by_id(&self, id: AppealId) -> Result<Option<Appeal>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, organisation, template, creator, content, status, created_at, deleted_at
            FROM appeals
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("get appeal by id"))?;

        row.as_ref().map(map_appeal).transpose()
    }

    async fn list(&self, organisation: OrganisationId) -> Result<Vec<Appeal>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, organisation, template, creator, content, status, created_at, deleted_at
            FROM appeals
            WHERE organisation = $1 AND deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(organisation.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("list appeals"))?;

        rows.iter().map(map_appeal).collect()
    }

    async fn answers(&self, id: AppealId) -> Result<Vec<AppealAnswer>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, appeal, field, kind, content
            FROM appeal_answers
            WHERE appeal = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("list appeal answers"))?;

        rows.iter().map(map_answer).collect()
    }

    async fn decide(
        &self,
        id: AppealId,
        code: DecisionCode,
    ) -> Result<DecisionApplied, DomainError> {
        let updated = sqlx::query("UPDATE appeals SET status = $2 WHERE id = $1 AND status = 0")
            .bind(id.as_uuid())
            .bind(code.as_u8() as i16)
            .execute(&self.pool)
            .await
            .map_err(unavailable("decide appeal"))?;

        if updated.rows_affected() == 1 {
            return Ok(DecisionApplied::Applied);
        }

        let exists = sqlx::query("SELECT 1 FROM appeals WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable("decide appeal"))?;

        match exists {
            Some(_) => Ok(DecisionApplied::AlreadyDecided),
            None => Err(DomainError::not_found("appeal")),
        }
    }
}

#[async_trait]
impl ResponseStore for PostgresStore {
    async fn insert(&self, response: AppealResponse) -> Result<AppealResponse, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO appeal_responses (id, appeal, author, content, decision, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(response.id.as_uuid())
        .bind(response.appeal.as_uuid())
        .bind(response.author.as_uuid())
        .bind(&response.content)
        .bind(response.decision.map(|d| d.as_u8() as i16))
        .bind(response.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(response),
            Err(e) if is_foreign_key_violation(&e) => Err(DomainError::not_found("appeal")),
            Err(e) => Err(unavailable("insert appeal response")(e)),
        }
    }

    async fn list_for_appeal(&self, id: AppealId) -> Result<Vec<AppealResponse>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, appeal, author, content, decision, created_at
            FROM appeal_responses
            WHERE appeal = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("list appeal responses"))?;

        rows.iter().map(map_response).collect()
    }
}
