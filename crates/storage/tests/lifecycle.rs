//! End-to-end lifecycle tests for the domain services over the in-memory
//! store: registration/login, organisation management, template quotas,
//! replace-then-purge, the single-open-case invariant and decision
//! application.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use tribunal_auth::{Argon2Hasher, Claims, PasswordHasher};
use tribunal_catalog::{FieldDraft, FieldKind, TemplateCatalog, TemplateDraft};
use tribunal_core::{DomainError, PrincipalId};
use tribunal_directory::{
    Directory, ManagementGuard, Organisation, OrganisationDraft, PlanTier, Principal,
    PrincipalStore,
};
use tribunal_registry::{
    AnswerDraft, CaseDraft, CaseRegistry, CaseStatus, DecisionCode, DecisionOutcome,
    ResponseProcessor,
};
use tribunal_storage::MemoryStore;

struct Harness {
    store: Arc<MemoryStore>,
    directory: Directory,
    catalog: TemplateCatalog,
    registry: Arc<CaseRegistry>,
    processor: ResponseProcessor,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher);

    let directory = Directory::new(store.clone(), store.clone(), hasher);
    let catalog = TemplateCatalog::new(store.clone(), store.clone(), store.clone());
    let registry = Arc::new(CaseRegistry::new(store.clone(), store.clone(), store.clone()));
    let processor = ResponseProcessor::new(store.clone(), store.clone());

    Harness {
        store,
        directory,
        catalog,
        registry,
        processor,
    }
}

fn claims_for(principal: &Principal) -> Claims {
    let now = Utc::now();
    Claims {
        principal_id: principal.id,
        email: principal.email.clone(),
        global_admin: principal.global_admin,
        plan_tier: principal.plan_tier.as_u8(),
        issued_at: now,
        not_before: now,
        expires_at: now + Duration::minutes(5),
        issuer: "tribunal".to_string(),
        audience: "http://localhost".to_string(),
    }
}

fn admin_claims() -> Claims {
    let now = Utc::now();
    Claims {
        principal_id: PrincipalId::new(),
        email: "root@example.com".to_string(),
        global_admin: true,
        plan_tier: 0,
        issued_at: now,
        not_before: now,
        expires_at: now + Duration::minutes(5),
        issuer: "tribunal".to_string(),
        audience: "http://localhost".to_string(),
    }
}

async fn register(h: &Harness, email: &str) -> Principal {
    h.directory.register(email, "hunter2hunter2").await.unwrap()
}

async fn make_org(h: &Harness, owner: &Principal, url: &str) -> Organisation {
    h.directory
        .create_organisation(
            &claims_for(owner),
            OrganisationDraft {
                name: format!("org {url}"),
                url: url.to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap()
}

fn template_draft(name: &str) -> TemplateDraft {
    TemplateDraft {
        name: name.to_string(),
        fields: vec![FieldDraft {
            title: "Why should we reconsider?".to_string(),
            kind: FieldKind::LongText,
            character_limit: 2000,
            description: String::new(),
            placeholder: String::new(),
        }],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_login() {
    let h = harness();

    let registered = register(&h, "alice@example.com").await;
    let logged_in = h
        .directory
        .login("Alice@Example.com", "hunter2hunter2")
        .await
        .unwrap();

    assert_eq!(registered.id, logged_in.id);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let h = harness();

    register(&h, "alice@example.com").await;
    let second = h.directory.register("alice@example.com", "other-password").await;

    assert!(matches!(second, Err(DomainError::Conflict(_))));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let h = harness();
    register(&h, "alice@example.com").await;

    let wrong_password = h.directory.login("alice@example.com", "wrong").await;
    let unknown_email = h.directory.login("nobody@example.com", "hunter2hunter2").await;

    assert_eq!(wrong_password, Err(DomainError::Unauthenticated));
    assert_eq!(unknown_email, Err(DomainError::Unauthenticated));
}

#[tokio::test]
async fn external_registration_returns_existing_account() {
    let h = harness();
    let existing = register(&h, "alice@example.com").await;

    let via_provider = h
        .directory
        .register_external(
            "alice@example.com",
            tribunal_directory::ExternalIdentity {
                provider: "discord".to_string(),
                subject: "1234".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(via_provider.id, existing.id);
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization guard
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn guard_owner_admin_moderator_stranger() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let stranger = register(&h, "stranger@example.com").await;
    let moderator = register(&h, "mod@example.com").await;

    let org = make_org(&h, &owner, "example").await;
    h.directory
        .add_moderator(org.id, &claims_for(&owner), moderator.id)
        .await
        .unwrap();

    let guard = ManagementGuard::new(h.store.clone());
    assert!(guard.can_manage(org.id, &claims_for(&owner)).await);
    assert!(guard.can_manage(org.id, &admin_claims()).await);
    assert!(!guard.can_manage(org.id, &claims_for(&stranger)).await);
    // Moderator membership grants respond capability, never management.
    assert!(!guard.can_manage(org.id, &claims_for(&moderator)).await);
}

#[tokio::test]
async fn guard_denies_on_missing_organisation() {
    let h = harness();
    let guard = ManagementGuard::new(h.store.clone());

    assert!(
        !guard
            .can_manage(tribunal_core::OrganisationId::new(), &admin_claims())
            .await
    );
}

#[tokio::test]
async fn non_owner_gets_forbidden_from_catalog_mutations() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let stranger = register(&h, "stranger@example.com").await;
    let org = make_org(&h, &owner, "example").await;

    let template = h
        .catalog
        .create(org.id, &claims_for(&owner), template_draft("Ban Appeal"))
        .await
        .unwrap();

    let create = h
        .catalog
        .create(org.id, &claims_for(&stranger), template_draft("Nope"))
        .await;
    let update = h
        .catalog
        .update(
            org.id,
            template.id,
            &claims_for(&stranger),
            template_draft("Nope"),
        )
        .await;
    let delete = h
        .catalog
        .delete(org.id, template.id, &claims_for(&stranger))
        .await;

    assert!(matches!(create, Err(DomainError::Forbidden)));
    assert!(matches!(update, Err(DomainError::Forbidden)));
    assert!(matches!(delete, Err(DomainError::Forbidden)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Quota
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn free_tier_capped_at_two_templates() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let org = make_org(&h, &owner, "example").await;
    let claims = claims_for(&owner);

    h.catalog
        .create(org.id, &claims, template_draft("First"))
        .await
        .unwrap();
    h.catalog
        .create(org.id, &claims, template_draft("Second"))
        .await
        .unwrap();

    let third = h.catalog.create(org.id, &claims, template_draft("Third")).await;
    assert!(matches!(third, Err(DomainError::QuotaExceeded(_))));
}

#[tokio::test]
async fn premium_owner_is_unbounded() {
    let h = harness();
    // Seed the premium tier directly; plan changes are a billing concern
    // outside the directory service.
    let mut premium = Principal::with_password(
        "premium@example.com".to_string(),
        "irrelevant".to_string(),
        Utc::now(),
    );
    premium.plan_tier = PlanTier(1);
    let premium = PrincipalStore::insert(h.store.as_ref(), premium).await.unwrap();

    let org = make_org(&h, &premium, "premium-org").await;
    let claims = claims_for(&premium);

    for i in 0..5 {
        h.catalog
            .create(org.id, &claims, template_draft(&format!("Template {i}")))
            .await
            .unwrap();
    }

    assert_eq!(h.catalog.list(org.id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn quota_follows_owner_tier_not_caller() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let org = make_org(&h, &owner, "example").await;

    // A global admin (free tier themselves) still hits the ceiling of the
    // free-tier owner.
    let admin = admin_claims();
    h.catalog
        .create(org.id, &admin, template_draft("First"))
        .await
        .unwrap();
    h.catalog
        .create(org.id, &admin, template_draft("Second"))
        .await
        .unwrap();

    let third = h.catalog.create(org.id, &admin, template_draft("Third")).await;
    assert!(matches!(third, Err(DomainError::QuotaExceeded(_))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Template updates & deletion
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_set_purges_superseded_fields() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let org = make_org(&h, &owner, "example").await;
    let claims = claims_for(&owner);

    let template = h
        .catalog
        .create(org.id, &claims, template_draft("Ban Appeal"))
        .await
        .unwrap();
    let old_field = template.fields[0].id;

    let updated = h
        .catalog
        .update(org.id, template.id, &claims, template_draft("Ban Appeal v2"))
        .await
        .unwrap();

    assert_eq!(updated.name, "Ban Appeal v2");
    assert!(updated.fields.iter().all(|f| f.id != old_field));

    let reloaded = h.catalog.get(org.id, template.id).await.unwrap();
    assert_eq!(reloaded.fields, updated.fields);
}

#[tokio::test]
async fn deleting_template_with_open_appeals_succeeds_and_cascades() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let creator = register(&h, "user@example.com").await;
    let org = make_org(&h, &owner, "example").await;
    let claims = claims_for(&owner);

    let template = h
        .catalog
        .create(org.id, &claims, template_draft("Ban Appeal"))
        .await
        .unwrap();

    let appeal = h
        .registry
        .create_case(
            org.id,
            creator.id,
            CaseDraft {
                template: template.id,
                content: json!({"reason": "please"}),
                answers: vec![],
            },
        )
        .await
        .unwrap();
    assert!(appeal.status.is_open());

    // No open-appeal check on deletion, by design.
    h.catalog.delete(org.id, template.id, &claims).await.unwrap();

    assert!(matches!(
        h.catalog.get(org.id, template.id).await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        h.registry.get_case(org.id, appeal.id).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn organisation_delete_cascades_everything() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let creator = register(&h, "user@example.com").await;
    let org = make_org(&h, &owner, "example").await;
    let claims = claims_for(&owner);

    let template = h
        .catalog
        .create(org.id, &claims, template_draft("Ban Appeal"))
        .await
        .unwrap();
    let appeal = h
        .registry
        .create_case(
            org.id,
            creator.id,
            CaseDraft {
                template: template.id,
                content: json!(null),
                answers: vec![],
            },
        )
        .await
        .unwrap();

    h.directory.delete_organisation(org.id, &claims).await.unwrap();

    assert!(matches!(
        h.directory.get_organisation(org.id).await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        h.catalog.get(org.id, template.id).await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        h.registry.get_case(org.id, appeal.id).await,
        Err(DomainError::NotFound(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Case lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_case_validates_org_template_and_answers() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let creator = register(&h, "user@example.com").await;
    let org = make_org(&h, &owner, "example").await;
    let other_org = make_org(&h, &owner, "other").await;
    let claims = claims_for(&owner);

    let template = h
        .catalog
        .create(org.id, &claims, template_draft("Ban Appeal"))
        .await
        .unwrap();

    let missing_org = h
        .registry
        .create_case(
            tribunal_core::OrganisationId::new(),
            creator.id,
            CaseDraft {
                template: template.id,
                content: json!(null),
                answers: vec![],
            },
        )
        .await;
    assert_eq!(missing_org, Err(DomainError::not_found("organisation")));

    // The template belongs to `org`; resolving it through another
    // organisation must fail.
    let wrong_org = h
        .registry
        .create_case(
            other_org.id,
            creator.id,
            CaseDraft {
                template: template.id,
                content: json!(null),
                answers: vec![],
            },
        )
        .await;
    assert_eq!(wrong_org, Err(DomainError::not_found("template")));

    let unknown_field = h
        .registry
        .create_case(
            org.id,
            creator.id,
            CaseDraft {
                template: template.id,
                content: json!(null),
                answers: vec![AnswerDraft {
                    field: tribunal_core::FieldId::new(),
                    content: "answer".to_string(),
                }],
            },
        )
        .await;
    assert!(matches!(unknown_field, Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn second_open_case_is_rejected() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let creator = register(&h, "user@example.com").await;
    let org = make_org(&h, &owner, "example").await;

    let template = h
        .catalog
        .create(org.id, &claims_for(&owner), template_draft("Ban Appeal"))
        .await
        .unwrap();

    let draft = || CaseDraft {
        template: template.id,
        content: json!({"reason": "please"}),
        answers: vec![],
    };

    h.registry.create_case(org.id, creator.id, draft()).await.unwrap();
    let second = h.registry.create_case(org.id, creator.id, draft()).await;
    assert_eq!(second, Err(DomainError::DuplicateOpenCase));

    // A different creator against the same template is fine.
    let other = register(&h, "other@example.com").await;
    h.registry.create_case(org.id, other.id, draft()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_case_creation_admits_exactly_one() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let creator = register(&h, "user@example.com").await;
    let org = make_org(&h, &owner, "example").await;

    let template = h
        .catalog
        .create(org.id, &claims_for(&owner), template_draft("Ban Appeal"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = h.registry.clone();
        let creator_id = creator.id;
        let org_id = org.id;
        let template_id = template.id;
        handles.push(tokio::spawn(async move {
            registry
                .create_case(
                    org_id,
                    creator_id,
                    CaseDraft {
                        template: template_id,
                        content: json!(null),
                        answers: vec![],
                    },
                )
                .await
        }));
    }

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(DomainError::DuplicateOpenCase) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);

    let open = h
        .registry
        .list_cases(org.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.creator == creator.id && a.status.is_open())
        .count();
    assert_eq!(open, 1);
}

#[tokio::test]
async fn decision_closes_case_exactly_once() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let creator = register(&h, "user@example.com").await;
    let moderator = register(&h, "mod@example.com").await;
    let org = make_org(&h, &owner, "example").await;

    let template = h
        .catalog
        .create(org.id, &claims_for(&owner), template_draft("Ban Appeal"))
        .await
        .unwrap();
    let appeal = h
        .registry
        .create_case(
            org.id,
            creator.id,
            CaseDraft {
                template: template.id,
                content: json!(null),
                answers: vec![],
            },
        )
        .await
        .unwrap();

    // Commentary leaves the case open.
    let (_, outcome) = h
        .processor
        .add_response(appeal.id, moderator.id, "looking into it".to_string(), None)
        .await
        .unwrap();
    assert_eq!(outcome, DecisionOutcome::NotADecision);
    assert!(h.registry.get_case(org.id, appeal.id).await.unwrap().status.is_open());

    // A decision closes it.
    let rejected = DecisionCode::new(2).unwrap();
    let (_, outcome) = h
        .processor
        .add_response(appeal.id, moderator.id, "rejected".to_string(), Some(rejected))
        .await
        .unwrap();
    assert_eq!(outcome, DecisionOutcome::Applied);
    assert_eq!(
        h.registry.get_case(org.id, appeal.id).await.unwrap().status,
        CaseStatus::Decided(rejected)
    );

    // Re-deciding is rejected; the response is still recorded.
    let (_, outcome) = h
        .processor
        .add_response(
            appeal.id,
            moderator.id,
            "actually accepted".to_string(),
            Some(DecisionCode::new(1).unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(outcome, DecisionOutcome::AlreadyDecided);
    assert_eq!(
        h.registry.get_case(org.id, appeal.id).await.unwrap().status,
        CaseStatus::Decided(rejected)
    );

    // Commentary after closure is still welcome (audit trail).
    let (_, outcome) = h
        .processor
        .add_response(appeal.id, creator.id, "thanks anyway".to_string(), None)
        .await
        .unwrap();
    assert_eq!(outcome, DecisionOutcome::NotADecision);
    assert_eq!(h.processor.responses_for(appeal.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn case_lookup_is_organisation_scoped() {
    let h = harness();
    let owner = register(&h, "owner@example.com").await;
    let creator = register(&h, "user@example.com").await;
    let org = make_org(&h, &owner, "example").await;
    let other_org = make_org(&h, &owner, "other").await;

    let template = h
        .catalog
        .create(org.id, &claims_for(&owner), template_draft("Ban Appeal"))
        .await
        .unwrap();
    let appeal = h
        .registry
        .create_case(
            org.id,
            creator.id,
            CaseDraft {
                template: template.id,
                content: json!(null),
                answers: vec![],
            },
        )
        .await
        .unwrap();

    assert!(h.registry.get_case(org.id, appeal.id).await.is_ok());
    assert!(matches!(
        h.registry.get_case(other_org.id, appeal.id).await,
        Err(DomainError::NotFound(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// The full walkthrough
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn free_tier_walkthrough() {
    let h = harness();
    let u1 = register(&h, "u1@example.com").await;
    let u2 = register(&h, "u2@example.com").await;
    let moderator = register(&h, "mod@example.com").await;
    let org = make_org(&h, &u1, "community").await;
    let owner_claims = claims_for(&u1);

    // Two templates fit the free plan, a third does not.
    let ban_appeal = h
        .catalog
        .create(org.id, &owner_claims, template_draft("Ban Appeal"))
        .await
        .unwrap();
    h.catalog
        .create(org.id, &owner_claims, template_draft("Mute Appeal"))
        .await
        .unwrap();
    assert!(matches!(
        h.catalog
            .create(org.id, &owner_claims, template_draft("Warn Appeal"))
            .await,
        Err(DomainError::QuotaExceeded(_))
    ));

    // U2 opens a case; the immediate repeat is refused.
    let case = h
        .registry
        .create_case(
            org.id,
            u2.id,
            CaseDraft {
                template: ban_appeal.id,
                content: json!({"reason": "mistaken identity"}),
                answers: vec![AnswerDraft {
                    field: ban_appeal.fields[0].id,
                    content: "I was not even online".to_string(),
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(case.status, CaseStatus::Open);

    assert_eq!(
        h.registry
            .create_case(
                org.id,
                u2.id,
                CaseDraft {
                    template: ban_appeal.id,
                    content: json!({"reason": "again"}),
                    answers: vec![],
                },
            )
            .await,
        Err(DomainError::DuplicateOpenCase)
    );

    // A moderator decides; the case reports Decided(1).
    let (_, outcome) = h
        .processor
        .add_response(
            case.id,
            moderator.id,
            "unbanned, sorry".to_string(),
            Some(DecisionCode::new(1).unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(outcome, DecisionOutcome::Applied);
    assert_eq!(
        h.registry.get_case(org.id, case.id).await.unwrap().status.as_code(),
        1
    );

    // Decided means U2 may open a fresh case against the same template.
    h.registry
        .create_case(
            org.id,
            u2.id,
            CaseDraft {
                template: ban_appeal.id,
                content: json!({"reason": "banned again"}),
                answers: vec![],
            },
        )
        .await
        .unwrap();
}
