//! HTTP-level tests for the API key lifecycle endpoints.

use std::sync::Arc;

use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use fusion_server::api;
use fusion_server::config::API_KEY_HEADER;
use fusion_server::db::memory::MemoryStore;
use fusion_server::db::{CredentialStore, SharedStore};
use fusion_server::models::{Organization, TenantEnvironment};

async fn seed_tenant(store: &MemoryStore, is_production: bool) -> (Uuid, Uuid) {
    let org = Organization {
        id: Uuid::new_v4(),
        name: "Acme".to_string(),
        slug: "acme-77aa".to_string(),
        created_at: Utc::now(),
    };
    let env = TenantEnvironment {
        id: Uuid::new_v4(),
        organization_id: org.id,
        name: if is_production { "production" } else { "sandbox" }.to_string(),
        is_production,
        created_at: Utc::now(),
    };
    store.insert_organization(&org).await.unwrap();
    store.insert_environment(&env).await.unwrap();
    (org.id, env.id)
}

macro_rules! key_app {
    ($store:expr) => {{
        let shared: SharedStore = $store.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new(shared))
                .service(web::scope("/api/v1").configure(api::configure_key_routes)),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_create_key_returns_secret_once_and_masks_reads() {
    let store = Arc::new(MemoryStore::new());
    let (org, env) = seed_tenant(&store, false).await;
    let app = key_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys")
        .set_json(json!({
            "organizationId": org,
            "environmentId": env,
            "keyName": "CI - GitHub Actions",
            "scopes": ["verify", "audit"]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let full_key = body["fullKey"].as_str().unwrap();
    assert!(full_key.starts_with("fus_test_"));
    assert_eq!(
        body["apiKey"]["key_secret_partial"].as_str().unwrap(),
        &full_key[full_key.len() - 4..]
    );
    assert_eq!(body["apiKey"]["key_name"], "CI - GitHub Actions");

    // subsequent reads never reveal the secret
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/keys/{}", org))
        .to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    let entry = &listed["api_keys"][0];
    assert_eq!(entry["key_prefix"], "fus_test_");
    assert!(entry.get("fullKey").is_none());
    assert!(entry.get("key_hash").is_none());
}

#[actix_web::test]
async fn test_create_key_production_prefix() {
    let store = Arc::new(MemoryStore::new());
    let (org, env) = seed_tenant(&store, true).await;
    let app = key_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys")
        .set_json(json!({
            "organizationId": org,
            "environmentId": env,
            "keyName": "Prod",
            "scopes": ["verify"]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert!(body["fullKey"].as_str().unwrap().starts_with("fus_live_"));
}

#[actix_web::test]
async fn test_create_key_names_invalid_scope() {
    let store = Arc::new(MemoryStore::new());
    let (org, env) = seed_tenant(&store, false).await;
    let app = key_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys")
        .set_json(json!({
            "organizationId": org,
            "environmentId": env,
            "keyName": "Bad",
            "scopes": ["verify", "delete_everything"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("delete_everything"));
}

#[actix_web::test]
async fn test_create_key_unknown_environment() {
    let store = Arc::new(MemoryStore::new());
    let (org, _env) = seed_tenant(&store, false).await;
    let app = key_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys")
        .set_json(json!({
            "organizationId": org,
            "environmentId": Uuid::new_v4(),
            "keyName": "Orphan",
            "scopes": ["verify"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_rotate_copies_scopes_and_terminalizes_old_key() {
    let store = Arc::new(MemoryStore::new());
    let (org, env) = seed_tenant(&store, false).await;
    let app = key_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys")
        .set_json(json!({
            "organizationId": org,
            "environmentId": env,
            "keyName": "Rotor",
            "scopes": ["verify", "webhook_manage"]
        }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let key_id = created["apiKey"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/v1/keys/rotate")
        .set_json(json!({ "keyId": key_id, "organizationId": org }))
        .to_request();
    let rotated: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(rotated["apiKey"]["key_name"], "Rotor (Rotated)");
    assert_eq!(
        rotated["apiKey"]["scopes"],
        json!(["verify", "webhook_manage"])
    );
    assert_ne!(rotated["newKey"], created["fullKey"]);

    // a second rotation of the old key hits the terminal state
    let req = test::TestRequest::post()
        .uri("/api/v1/keys/rotate")
        .set_json(json!({ "keyId": key_id, "organizationId": org }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_revoke_is_one_way() {
    let store = Arc::new(MemoryStore::new());
    let (org, env) = seed_tenant(&store, false).await;
    let app = key_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys")
        .set_json(json!({
            "organizationId": org,
            "environmentId": env,
            "keyName": "Doomed",
            "scopes": ["audit"]
        }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let key_id = created["apiKey"]["id"].as_str().unwrap().to_string();

    let revoke = json!({ "keyId": key_id, "organizationId": org, "revokedBy": "ops@acme.test" });
    let req = test::TestRequest::post()
        .uri("/api/v1/keys/revoke")
        .set_json(&revoke)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // rejected, not silently accepted
    let req = test::TestRequest::post()
        .uri("/api/v1/keys/revoke")
        .set_json(&revoke)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/keys/{}", org))
        .to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed["api_keys"][0]["is_active"], json!(false));
}

#[actix_web::test]
async fn test_verify_endpoint_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let (org, env) = seed_tenant(&store, false).await;
    let app = key_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys")
        .set_json(json!({
            "organizationId": org,
            "environmentId": env,
            "keyName": "Caller",
            "scopes": ["verify"]
        }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let full_key = created["fullKey"].as_str().unwrap().to_string();
    let key_id = created["apiKey"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/v1/verify")
        .insert_header((API_KEY_HEADER, full_key.clone()))
        .to_request();
    let caller: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(caller["name"], "Caller");
    assert_eq!(caller["organization_id"].as_str().unwrap(), org.to_string());

    // missing and bogus keys are both 401
    let req = test::TestRequest::get().uri("/api/v1/verify").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get()
        .uri("/api/v1/verify")
        .insert_header((API_KEY_HEADER, "fus_test_bogus"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    // a revoked key stops authenticating
    let req = test::TestRequest::post()
        .uri("/api/v1/keys/revoke")
        .set_json(json!({ "keyId": key_id, "organizationId": org, "revokedBy": "test" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get()
        .uri("/api/v1/verify")
        .insert_header((API_KEY_HEADER, full_key))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}
