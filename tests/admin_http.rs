//! HTTP-level tests for the admin TOTP and email-code login endpoints.

use std::sync::Arc;

use actix_web::{test, web, App};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use uuid::Uuid;

use fusion_server::api;
use fusion_server::config::{Config, Environment};
use fusion_server::db::memory::MemoryStore;
use fusion_server::db::{CredentialStore, SharedStore};
use fusion_server::models::VerificationCode;
use fusion_server::services::email::Mailer;
use fusion_server::services::{secrets, totp};

fn test_config() -> Config {
    Config {
        environment: Environment::Development,
        host: "127.0.0.1".to_string(),
        port: 8080,
        database_url: SecretString::from("postgres://test"),
        admin_email_domain: "fusion.io".to_string(),
        totp_issuer: "Fusion".to_string(),
        code_ttl_secs: 300,
        session_ttl_secs: 86_400,
        smtp: None,
    }
}

async fn seed_code(store: &MemoryStore, email: &str, code: &str) {
    let now = Utc::now();
    store
        .replace_verification_code(&VerificationCode {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code_hash: secrets::hash_secret(code),
            expires_at: now + Duration::minutes(5),
            created_at: now,
        })
        .await
        .unwrap();
}

macro_rules! admin_app {
    ($store:expr) => {{
        let shared: SharedStore = $store.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new(shared))
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(Mailer::new(None)))
                .service(web::scope("/api/v1").configure(api::configure_admin_routes)),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_send_code_rejects_foreign_domain() {
    let store = Arc::new(MemoryStore::new());
    let app = admin_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/send")
        .set_json(json!({ "email": "intruder@evil.example" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
}

#[actix_web::test]
async fn test_send_code_for_allowed_domain() {
    let store = Arc::new(MemoryStore::new());
    let app = admin_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/send")
        .set_json(json!({ "email": "ops@fusion.io" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));

    assert!(store
        .find_verification_code("ops@fusion.io")
        .await
        .unwrap()
        .is_some());
}

#[actix_web::test]
async fn test_verify_code_login_flow() {
    let store = Arc::new(MemoryStore::new());
    seed_code(&store, "ops@fusion.io", "123456").await;
    let app = admin_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/verify")
        .set_json(json!({ "email": "ops@fusion.io", "code": "123456" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["token"].as_str().unwrap().len(), 64);
    assert_eq!(body["admin"]["email"], "ops@fusion.io");
    assert_eq!(body["admin"]["role"], "ops_admin");
    assert!(body["expiresAt"].as_str().is_some());
    // the TOTP secret never leaves the server
    assert!(body["admin"].get("totp_secret").is_none());

    // single use
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/verify")
        .set_json(json!({ "email": "ops@fusion.io", "code": "123456" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn test_verify_code_rejects_wrong_and_expired() {
    let store = Arc::new(MemoryStore::new());
    seed_code(&store, "ops@fusion.io", "123456").await;
    let app = admin_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/verify")
        .set_json(json!({ "email": "ops@fusion.io", "code": "000000" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // expired code is rejected and deleted
    let now = Utc::now();
    store
        .replace_verification_code(&VerificationCode {
            id: Uuid::new_v4(),
            email: "late@fusion.io".to_string(),
            code_hash: secrets::hash_secret("222222"),
            expires_at: now - Duration::seconds(1),
            created_at: now - Duration::minutes(6),
        })
        .await
        .unwrap();

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/verify")
        .set_json(json!({ "email": "late@fusion.io", "code": "222222" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
    assert!(store
        .find_verification_code("late@fusion.io")
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
async fn test_totp_enrollment_over_http() {
    let store = Arc::new(MemoryStore::new());
    seed_code(&store, "ops@fusion.io", "123456").await;
    let app = admin_app!(store);

    // log in to create the admin record
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/verify")
        .set_json(json!({ "email": "ops@fusion.io", "code": "123456" }))
        .to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;
    let admin_id = session["admin"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/totp/generate")
        .set_json(json!({ "adminId": admin_id, "email": "ops@fusion.io" }))
        .to_request();
    let enrollment: Value = test::call_and_read_body_json(&app, req).await;
    let secret = enrollment["secret"].as_str().unwrap().to_string();
    assert!(enrollment["otpauthUri"]
        .as_str()
        .unwrap()
        .starts_with("otpauth://totp/"));
    assert!(enrollment["qrCode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));

    // a code from a different secret must not enable, and must not persist
    let wrong_secret = totp::generate_secret();
    let wrong_code = totp::code_at(&wrong_secret, Utc::now().timestamp() as u64).unwrap();
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/totp/enable")
        .set_json(json!({
            "adminId": admin_id,
            "email": "ops@fusion.io",
            "secret": secret,
            "code": wrong_code
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
    let admin_uuid = Uuid::parse_str(&admin_id).unwrap();
    assert!(!store.find_admin(admin_uuid).await.unwrap().unwrap().totp_enabled);

    // the matching code enables it
    let code = totp::code_at(&secret, Utc::now().timestamp() as u64).unwrap();
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/totp/enable")
        .set_json(json!({
            "adminId": admin_id,
            "email": "ops@fusion.io",
            "secret": secret,
            "code": code
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));
    assert!(store.find_admin(admin_uuid).await.unwrap().unwrap().totp_enabled);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/totp/disable")
        .set_json(json!({ "adminId": admin_id, "email": "ops@fusion.io" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));

    let admin = store.find_admin(admin_uuid).await.unwrap().unwrap();
    assert!(!admin.totp_enabled);
    assert!(admin.totp_secret.is_none());
}

#[actix_web::test]
async fn test_totp_requests_must_name_the_admin_email() {
    let store = Arc::new(MemoryStore::new());
    seed_code(&store, "ops@fusion.io", "123456").await;
    let app = admin_app!(store);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/code/verify")
        .set_json(json!({ "email": "ops@fusion.io", "code": "123456" }))
        .to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;
    let admin_id = session["admin"]["id"].as_str().unwrap().to_string();

    // someone else's email paired with a real admin id is rejected
    let req = test::TestRequest::post()
        .uri("/api/v1/admin/totp/generate")
        .set_json(json!({ "adminId": admin_id, "email": "other@fusion.io" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/v1/admin/totp/disable")
        .set_json(json!({ "adminId": admin_id, "email": "other@fusion.io" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}
