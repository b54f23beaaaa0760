use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use tribunal_api::config::AppConfig;
use tribunal_auth::TokenConfig;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory storage, ephemeral port.
        let config = AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            token: TokenConfig {
                secret: JWT_SECRET.to_string(),
                issuer: "tribunal".to_string(),
                audience: "http://localhost".to_string(),
            },
            database_url: None,
            discord: None,
        };

        let app = tribunal_api::app::build_app(config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn register_and_login(client: &reqwest::Client, base_url: &str, email: &str) -> String {
    let res = client
        .post(format!("{base_url}/api/auth/register"))
        .json(&json!({ "email": email, "password": "hunter2hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{base_url}/api/auth/login"))
        .json(&json!({ "email": email, "password": "hunter2hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    body["body"]["token"].as_str().unwrap().to_string()
}

/// Mint a token directly, bypassing registration (global-admin accounts have
/// no registration endpoint).
fn mint_admin_jwt() -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": uuid::Uuid::now_v7(),
        "email": "root@example.com",
        "admin": true,
        "plan": 0,
        "iat": now,
        "nbf": now,
        "exp": now + 300,
        "iss": "tribunal",
        "aud": "http://localhost",
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn mint_expired_jwt() -> String {
    let issued = Utc::now().timestamp() - 3600;
    let claims = json!({
        "sub": uuid::Uuid::now_v7(),
        "email": "ghost@example.com",
        "admin": false,
        "plan": 0,
        "iat": issued,
        "nbf": issued,
        "exp": issued + 300,
        "iss": "tribunal",
        "aud": "http://localhost",
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/organisations", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    // Envelope mirrors the HTTP status.
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/organisations", srv.base_url))
        .bearer_auth(mint_expired_jwt())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["error"], "expired_token");
}

#[tokio::test]
async fn garbage_token_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/organisations", srv.base_url))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_extends_the_window() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/auth/register", srv.base_url))
        .json(&json!({ "email": "alice@example.com", "password": "hunter2hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/api/auth/login", srv.base_url))
        .json(&json!({ "email": "alice@example.com", "password": "hunter2hunter2" }))
        .send()
        .await
        .unwrap();
    let login_body: Value = res.json().await.unwrap();
    let token = login_body["body"]["token"].as_str().unwrap();
    let expiration = login_body["body"]["expiration"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/api/auth/refresh", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let refresh_body: Value = res.json().await.unwrap();
    let refreshed = refresh_body["body"]["expiration"].as_str().unwrap();

    // RFC 3339 timestamps compare chronologically when parsed.
    let before: chrono::DateTime<Utc> = expiration.parse().unwrap();
    let after: chrono::DateTime<Utc> = refreshed.parse().unwrap();
    assert!(after >= before);

    // The refreshed token must itself be usable.
    let new_token = refresh_body["body"]["token"].as_str().unwrap();
    let res = client
        .get(format!("{}/api/organisations", srv.base_url))
        .bearer_auth(new_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_of_expired_token_is_refused() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/auth/refresh", srv.base_url))
        .bearer_auth(mint_expired_jwt())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["error"], "expired_token");
}

#[tokio::test]
async fn non_owner_is_forbidden_from_template_management() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &srv.base_url, "owner@example.com").await;
    let stranger = register_and_login(&client, &srv.base_url, "stranger@example.com").await;

    let res = client
        .post(format!("{}/api/organisations/create", srv.base_url))
        .bearer_auth(&owner)
        .json(&json!({ "name": "Example", "url": "example" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let org: Value = res.json().await.unwrap();
    let org_id = org["body"]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!(
            "{}/api/appeals/{}/templates/create",
            srv.base_url, org_id
        ))
        .bearer_auth(&stranger)
        .json(&json!({ "name": "Ban Appeal", "fields": [] }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn global_admin_may_manage_any_organisation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &srv.base_url, "owner@example.com").await;

    let res = client
        .post(format!("{}/api/organisations/create", srv.base_url))
        .bearer_auth(&owner)
        .json(&json!({ "name": "Example", "url": "example" }))
        .send()
        .await
        .unwrap();
    let org: Value = res.json().await.unwrap();
    let org_id = org["body"]["id"].as_str().unwrap().to_string();

    let res = client
        .put(format!(
            "{}/api/organisations/{}/update",
            srv.base_url, org_id
        ))
        .bearer_auth(mint_admin_jwt())
        .json(&json!({ "description": "managed by staff" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["description"], "managed by staff");
}

#[tokio::test]
async fn appeal_walkthrough_quota_duplicates_and_decision() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &srv.base_url, "owner@example.com").await;
    let user = register_and_login(&client, &srv.base_url, "user@example.com").await;
    let moderator = register_and_login(&client, &srv.base_url, "mod@example.com").await;

    // Organisation
    let res = client
        .post(format!("{}/api/organisations/create", srv.base_url))
        .bearer_auth(&owner)
        .json(&json!({ "name": "Community", "url": "community" }))
        .send()
        .await
        .unwrap();
    let org: Value = res.json().await.unwrap();
    let org_id = org["body"]["id"].as_str().unwrap().to_string();

    // Two templates succeed on the free plan.
    let res = client
        .post(format!(
            "{}/api/appeals/{}/templates/create",
            srv.base_url, org_id
        ))
        .bearer_auth(&owner)
        .json(&json!({
            "name": "Ban Appeal",
            "fields": [{ "title": "Why?", "kind": "long_text", "character_limit": 2000 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let template: Value = res.json().await.unwrap();
    let template_id = template["body"]["id"].as_str().unwrap().to_string();
    let field_id = template["body"]["fields"][0]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!(
            "{}/api/appeals/{}/templates/create",
            srv.base_url, org_id
        ))
        .bearer_auth(&owner)
        .json(&json!({ "name": "Mute Appeal", "fields": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The third hits the free-plan ceiling.
    let res = client
        .post(format!(
            "{}/api/appeals/{}/templates/create",
            srv.base_url, org_id
        ))
        .bearer_auth(&owner)
        .json(&json!({ "name": "Warn Appeal", "fields": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["error"], "quota_exceeded");

    // User opens a case with an answer.
    let res = client
        .post(format!("{}/api/appeals/{}/create", srv.base_url, org_id))
        .bearer_auth(&user)
        .json(&json!({
            "template": template_id,
            "content": { "reason": "mistaken identity" },
            "answers": [{ "field": field_id, "content": "I was not even online" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let appeal: Value = res.json().await.unwrap();
    let appeal_id = appeal["body"]["id"].as_str().unwrap().to_string();
    assert_eq!(appeal["body"]["status"], 0);

    // The immediate repeat is refused.
    let res = client
        .post(format!("{}/api/appeals/{}/create", srv.base_url, org_id))
        .bearer_auth(&user)
        .json(&json!({ "template": template_id, "content": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["error"], "duplicate_open_case");

    // A moderator decides.
    let res = client
        .post(format!(
            "{}/api/appeals/{}/{}/respond",
            srv.base_url, org_id, appeal_id
        ))
        .bearer_auth(&moderator)
        .json(&json!({ "content": "unbanned, sorry", "decision": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["decision_outcome"], "applied");

    // The case now reports Decided(1), with the response attached.
    let res = client
        .get(format!(
            "{}/api/appeals/{}/{}",
            srv.base_url, org_id, appeal_id
        ))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["appeal"]["status"], 1);
    assert_eq!(body["body"]["answers"].as_array().unwrap().len(), 1);
    assert_eq!(body["body"]["responses"].as_array().unwrap().len(), 1);

    // A second decision is rejected, though the response is recorded.
    let res = client
        .post(format!(
            "{}/api/appeals/{}/{}/respond",
            srv.base_url, org_id, appeal_id
        ))
        .bearer_auth(&moderator)
        .json(&json!({ "content": "changed my mind", "decision": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["body"]["decision_outcome"], "already_decided");
}

#[tokio::test]
async fn cross_organisation_appeals_are_invisible() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let owner = register_and_login(&client, &srv.base_url, "owner@example.com").await;
    let user = register_and_login(&client, &srv.base_url, "user@example.com").await;

    let mut org_ids = Vec::new();
    for url in ["first", "second"] {
        let res = client
            .post(format!("{}/api/organisations/create", srv.base_url))
            .bearer_auth(&owner)
            .json(&json!({ "name": url, "url": url }))
            .send()
            .await
            .unwrap();
        let org: Value = res.json().await.unwrap();
        org_ids.push(org["body"]["id"].as_str().unwrap().to_string());
    }

    let res = client
        .post(format!(
            "{}/api/appeals/{}/templates/create",
            srv.base_url, org_ids[0]
        ))
        .bearer_auth(&owner)
        .json(&json!({ "name": "Ban Appeal", "fields": [] }))
        .send()
        .await
        .unwrap();
    let template: Value = res.json().await.unwrap();
    let template_id = template["body"]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/api/appeals/{}/create", srv.base_url, org_ids[0]))
        .bearer_auth(&user)
        .json(&json!({ "template": template_id, "content": {} }))
        .send()
        .await
        .unwrap();
    let appeal: Value = res.json().await.unwrap();
    let appeal_id = appeal["body"]["id"].as_str().unwrap().to_string();

    // Fetching through the other organisation 404s.
    let res = client
        .get(format!(
            "{}/api/appeals/{}/{}",
            srv.base_url, org_ids[1], appeal_id
        ))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
