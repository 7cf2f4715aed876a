//! Admin console authentication: TOTP enrollment and email-code login.
//!
//! Login is passwordless. An admin requests a 6-digit code (delivered by
//! email, allow-listed by domain), then exchanges it for an opaque 24-hour
//! session token. Codes and session tokens are stored as SHA-256 digests.
//! Every state change lands in the append-only audit trail.

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::Config;
use crate::db::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::models::{AdminSession, AdminUser, AuditRecord, VerificationCode, DEFAULT_ADMIN_ROLE, ROLE_SEED};
use crate::services::email::Mailer;
use crate::services::{secrets, totp};

/// A fresh TOTP enrollment, not yet persisted. The client must echo the
/// secret back together with a valid code to enable it.
#[derive(Debug)]
pub struct TotpEnrollment {
    pub secret: String,
    pub otpauth_uri: String,
    pub qr_data_url: String,
}

/// An issued admin session. The raw token appears only here; the store keeps
/// its digest.
#[derive(Debug)]
pub struct IssuedSession {
    pub admin: AdminUser,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn integrity_hash(admin_id: Uuid, at: DateTime<Utc>) -> String {
    secrets::hash_secret(&format!("{}{}", admin_id, at.to_rfc3339()))
}

async fn audit(
    store: &dyn CredentialStore,
    admin_id: Uuid,
    action: &str,
    detail: String,
) -> AppResult<()> {
    let now = Utc::now();
    store
        .insert_audit(&AuditRecord {
            id: Uuid::new_v4(),
            admin_id,
            action: action.to_string(),
            detail,
            integrity_hash: integrity_hash(admin_id, now),
            created_at: now,
        })
        .await
}

fn domain_of(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}

fn check_admin_domain(email: &str, allowed_domain: &str) -> AppResult<()> {
    match domain_of(email) {
        Some(domain) if domain.eq_ignore_ascii_case(allowed_domain) => Ok(()),
        _ => Err(AppError::Forbidden(
            "email domain is not allowed for admin access".to_string(),
        )),
    }
}

async fn find_admin_checked(
    store: &dyn CredentialStore,
    admin_id: Uuid,
    email: &str,
) -> AppResult<AdminUser> {
    let admin = store
        .find_admin(admin_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Admin {}", admin_id)))?;
    if !admin.email.eq_ignore_ascii_case(email.trim()) {
        return Err(AppError::InvalidInput(
            "email does not match admin record".to_string(),
        ));
    }
    Ok(admin)
}

// ---------------------------------------------------------------------------
// TOTP enrollment
// ---------------------------------------------------------------------------

/// Start TOTP enrollment for an admin: mint a secret and the matching
/// otpauth URI and QR code. Nothing is persisted until the admin proves
/// possession via [`enable_totp`].
pub async fn generate_totp(
    store: &dyn CredentialStore,
    admin_id: Uuid,
    email: &str,
    issuer: &str,
) -> AppResult<TotpEnrollment> {
    let admin = find_admin_checked(store, admin_id, email).await?;

    let secret = totp::generate_secret();
    let otpauth_uri = totp::provisioning_uri(&secret, &admin.email, issuer);
    let qr_data_url = totp::qr_data_url(&otpauth_uri)?;

    Ok(TotpEnrollment {
        secret,
        otpauth_uri,
        qr_data_url,
    })
}

/// Enable TOTP for an admin after verifying a code against the presented
/// secret. Persists the secret and flips `totp_enabled` in one step.
pub async fn enable_totp(
    store: &dyn CredentialStore,
    admin_id: Uuid,
    email: &str,
    secret: &str,
    code: &str,
) -> AppResult<AdminUser> {
    find_admin_checked(store, admin_id, email).await?;

    if !totp::verify_code_now(secret, code)? {
        return Err(AppError::InvalidInput("invalid TOTP code".to_string()));
    }

    if !store.set_admin_totp(admin_id, Some(secret.to_string())).await? {
        return Err(AppError::NotFound(format!("Admin {}", admin_id)));
    }
    audit(store, admin_id, "totp.enabled", "TOTP enrollment completed".to_string()).await?;

    store
        .find_admin(admin_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Admin {}", admin_id)))
}

/// Disable TOTP and clear the stored secret. Idempotent on the flag.
pub async fn disable_totp(
    store: &dyn CredentialStore,
    admin_id: Uuid,
    email: &str,
) -> AppResult<AdminUser> {
    find_admin_checked(store, admin_id, email).await?;

    if !store.set_admin_totp(admin_id, None).await? {
        return Err(AppError::NotFound(format!("Admin {}", admin_id)));
    }
    audit(store, admin_id, "totp.disabled", "TOTP disabled".to_string()).await?;

    store
        .find_admin(admin_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Admin {}", admin_id)))
}

// ---------------------------------------------------------------------------
// Email-code login
// ---------------------------------------------------------------------------

/// Issue a fresh 6-digit login code for an allow-listed admin email.
/// Any prior unconsumed code for the address is replaced.
pub async fn send_admin_code(
    store: &dyn CredentialStore,
    mailer: &Mailer,
    config: &Config,
    email: &str,
) -> AppResult<()> {
    let email = email.trim().to_lowercase();
    check_admin_domain(&email, &config.admin_email_domain)?;

    let code = secrets::verification_code();
    let now = Utc::now();
    store
        .replace_verification_code(&VerificationCode {
            id: Uuid::new_v4(),
            email: email.clone(),
            code_hash: secrets::hash_secret(&code),
            expires_at: now + Duration::seconds(config.code_ttl_secs as i64),
            created_at: now,
        })
        .await?;

    mailer.send_verification_code(&email, &code).await?;
    tracing::info!(email = %email, "admin verification code issued");
    Ok(())
}

/// Exchange a pending verification code for a 24-hour admin session.
///
/// The code is single-use: it is deleted on success and on expiry. First
/// login from the allow-listed domain creates the admin record with the
/// default role; the role taxonomy is seeded lazily on the same path.
pub async fn verify_admin_code(
    store: &dyn CredentialStore,
    config: &Config,
    email: &str,
    code: &str,
) -> AppResult<IssuedSession> {
    let email = email.trim().to_lowercase();
    check_admin_domain(&email, &config.admin_email_domain)?;

    let pending = store
        .find_verification_code(&email)
        .await?
        .ok_or_else(|| AppError::InvalidInput("invalid verification code".to_string()))?;

    let now = Utc::now();
    if pending.is_expired(now) {
        store.delete_verification_code(pending.id).await?;
        return Err(AppError::InvalidState(
            "verification code has expired".to_string(),
        ));
    }

    let presented = secrets::hash_secret(code.trim());
    if presented.as_bytes().ct_eq(pending.code_hash.as_bytes()).unwrap_u8() != 1 {
        return Err(AppError::InvalidInput(
            "invalid verification code".to_string(),
        ));
    }

    store.delete_verification_code(pending.id).await?;
    store.seed_roles_if_empty(ROLE_SEED).await?;
    let admin = store
        .upsert_admin_login(&email, DEFAULT_ADMIN_ROLE, now)
        .await?;

    let token = secrets::session_token();
    let expires_at = now + Duration::seconds(config.session_ttl_secs as i64);
    store
        .insert_session(&AdminSession {
            id: Uuid::new_v4(),
            admin_id: admin.id,
            token_hash: secrets::hash_secret(&token),
            expires_at,
            created_at: now,
        })
        .await?;
    audit(store, admin.id, "admin.login", format!("session issued for {}", email)).await?;

    tracing::info!(email = %email, admin_id = %admin.id, "admin session issued");
    Ok(IssuedSession {
        admin,
        token,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::db::memory::MemoryStore;

    fn test_config() -> Config {
        Config {
            environment: Environment::Development,
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: secrecy::SecretString::from("postgres://test"),
            admin_email_domain: "fusion.io".to_string(),
            totp_issuer: "Fusion".to_string(),
            code_ttl_secs: 300,
            session_ttl_secs: 86_400,
            smtp: None,
        }
    }

    async fn pending_code(store: &MemoryStore, email: &str, code: &str) {
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

    #[tokio::test]
    async fn test_send_code_rejects_foreign_domain() {
        let store = MemoryStore::new();
        let mailer = Mailer::new(None);
        let config = test_config();

        let err = send_admin_code(&store, &mailer, &config, "ops@evil.example")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(store.find_verification_code("ops@evil.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_code_replaces_prior_code() {
        let store = MemoryStore::new();
        let mailer = Mailer::new(None);
        let config = test_config();

        send_admin_code(&store, &mailer, &config, "Ops@Fusion.IO").await.unwrap();
        let first = store.find_verification_code("ops@fusion.io").await.unwrap().unwrap();

        send_admin_code(&store, &mailer, &config, "ops@fusion.io").await.unwrap();
        let second = store.find_verification_code("ops@fusion.io").await.unwrap().unwrap();

        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_verify_code_issues_session_and_seeds_roles() {
        let store = MemoryStore::new();
        let config = test_config();
        pending_code(&store, "ops@fusion.io", "123456").await;

        let issued = verify_admin_code(&store, &config, "ops@fusion.io", "123456")
            .await
            .unwrap();

        assert_eq!(issued.admin.email, "ops@fusion.io");
        assert_eq!(issued.admin.role, DEFAULT_ADMIN_ROLE);
        assert!(issued.admin.last_login_at.is_some());
        assert_eq!(issued.token.len(), 64);
        assert!(issued.expires_at > Utc::now() + Duration::hours(23));

        // single-use
        assert!(store.find_verification_code("ops@fusion.io").await.unwrap().is_none());

        let roles = store.role_names();
        assert!(roles.contains(&"super_admin".to_string()));
        assert!(roles.contains(&"ops_admin".to_string()));
        assert!(roles.contains(&"read_only".to_string()));

        let actions: Vec<String> = store.audit_records().iter().map(|r| r.action.clone()).collect();
        assert!(actions.contains(&"admin.login".to_string()));
    }

    #[tokio::test]
    async fn test_verify_code_rejects_wrong_code() {
        let store = MemoryStore::new();
        let config = test_config();
        pending_code(&store, "ops@fusion.io", "123456").await;

        let err = verify_admin_code(&store, &config, "ops@fusion.io", "654321")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        // a wrong guess does not consume the code
        assert!(store.find_verification_code("ops@fusion.io").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_verify_expired_code_is_deleted() {
        let store = MemoryStore::new();
        let config = test_config();
        let now = Utc::now();
        store
            .replace_verification_code(&VerificationCode {
                id: Uuid::new_v4(),
                email: "ops@fusion.io".to_string(),
                code_hash: secrets::hash_secret("123456"),
                expires_at: now - Duration::seconds(1),
                created_at: now - Duration::minutes(6),
            })
            .await
            .unwrap();

        let err = verify_admin_code(&store, &config, "ops@fusion.io", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(store.find_verification_code("ops@fusion.io").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_without_pending_code() {
        let store = MemoryStore::new();
        let config = test_config();

        let err = verify_admin_code(&store, &config, "ops@fusion.io", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_totp_enroll_enable_disable() {
        let store = MemoryStore::new();
        let config = test_config();
        pending_code(&store, "ops@fusion.io", "123456").await;
        let issued = verify_admin_code(&store, &config, "ops@fusion.io", "123456")
            .await
            .unwrap();
        let admin_id = issued.admin.id;

        let enrollment = generate_totp(&store, admin_id, "ops@fusion.io", "Fusion")
            .await
            .unwrap();
        assert!(enrollment.otpauth_uri.starts_with("otpauth://totp/"));
        assert!(enrollment.qr_data_url.starts_with("data:image/svg+xml;base64,"));

        // nothing persisted yet
        assert!(!store.find_admin(admin_id).await.unwrap().unwrap().totp_enabled);

        let now = Utc::now().timestamp() as u64;
        let code = totp::code_at(&enrollment.secret, now).unwrap();
        let admin = enable_totp(&store, admin_id, "ops@fusion.io", &enrollment.secret, &code)
            .await
            .unwrap();
        assert!(admin.totp_enabled);
        assert_eq!(admin.totp_secret.as_deref(), Some(enrollment.secret.as_str()));

        let admin = disable_totp(&store, admin_id, "ops@fusion.io").await.unwrap();
        assert!(!admin.totp_enabled);
        assert!(admin.totp_secret.is_none());

        let actions: Vec<String> = store.audit_records().iter().map(|r| r.action.clone()).collect();
        assert!(actions.contains(&"totp.enabled".to_string()));
        assert!(actions.contains(&"totp.disabled".to_string()));
    }

    #[tokio::test]
    async fn test_enable_totp_rejects_bad_code() {
        let store = MemoryStore::new();
        let config = test_config();
        pending_code(&store, "ops@fusion.io", "123456").await;
        let issued = verify_admin_code(&store, &config, "ops@fusion.io", "123456")
            .await
            .unwrap();

        let secret = totp::generate_secret();
        let err = enable_totp(&store, issued.admin.id, "ops@fusion.io", &secret, "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(!store.find_admin(issued.admin.id).await.unwrap().unwrap().totp_enabled);
    }

    #[tokio::test]
    async fn test_totp_rejects_mismatched_email() {
        let store = MemoryStore::new();
        let config = test_config();
        pending_code(&store, "ops@fusion.io", "123456").await;
        let issued = verify_admin_code(&store, &config, "ops@fusion.io", "123456")
            .await
            .unwrap();
        let admin_id = issued.admin.id;

        let err = generate_totp(&store, admin_id, "other@fusion.io", "Fusion")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let secret = totp::generate_secret();
        let now = Utc::now().timestamp() as u64;
        let code = totp::code_at(&secret, now).unwrap();
        let err = enable_totp(&store, admin_id, "other@fusion.io", &secret, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(!store.find_admin(admin_id).await.unwrap().unwrap().totp_enabled);

        // the stored email matches case-insensitively
        let enrollment = generate_totp(&store, admin_id, "Ops@Fusion.IO", "Fusion")
            .await
            .unwrap();
        assert!(enrollment.otpauth_uri.contains("ops%40fusion.io"));
    }

    #[tokio::test]
    async fn test_totp_for_missing_admin() {
        let store = MemoryStore::new();
        let err = generate_totp(&store, Uuid::new_v4(), "ops@fusion.io", "Fusion")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = disable_totp(&store, Uuid::new_v4(), "ops@fusion.io")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
