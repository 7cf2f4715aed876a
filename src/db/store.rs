//! The `CredentialStore` trait: every row operation the lifecycle services
//! need, behind one narrow seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    AdminSession, AdminUser, ApiKey, AuditRecord, Organization, TenantEnvironment,
    VerificationCode, Webhook, WebhookDelivery, WebhookPatch,
};

/// Row operations for the credential subsystem.
///
/// Lifecycle state transitions (revocation) are expressed as conditional
/// updates returning whether the transition happened, so concurrent attempts
/// on the same entity resolve deterministically instead of racing a
/// read-then-check window.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Cheap liveness probe for the readiness endpoint.
    async fn ping(&self) -> AppResult<()>;

    // --- tenants -----------------------------------------------------------

    async fn insert_organization(&self, org: &Organization) -> AppResult<()>;

    async fn insert_environment(&self, env: &TenantEnvironment) -> AppResult<()>;

    async fn find_environment(&self, id: Uuid) -> AppResult<Option<TenantEnvironment>>;

    // --- API keys ----------------------------------------------------------

    async fn insert_api_key(&self, key: &ApiKey) -> AppResult<()>;

    async fn find_api_key(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<ApiKey>>;

    async fn find_api_key_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>>;

    async fn list_api_keys(&self, organization_id: Uuid) -> AppResult<Vec<ApiKey>>;

    /// Atomically revoke a key: succeeds only if the key exists for the
    /// organization and `revoked_at` is still null. Returns whether the
    /// transition happened.
    async fn revoke_api_key(
        &self,
        id: Uuid,
        organization_id: Uuid,
        revoked_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    // --- webhooks ----------------------------------------------------------

    async fn insert_webhook(&self, webhook: &Webhook) -> AppResult<()>;

    async fn find_webhook(&self, id: Uuid) -> AppResult<Option<Webhook>>;

    /// Whitelisted partial update. Returns the updated row, or None if the
    /// webhook does not exist.
    async fn update_webhook(&self, id: Uuid, patch: &WebhookPatch) -> AppResult<Option<Webhook>>;

    /// Hard delete; delivery history cascades with the parent.
    async fn delete_webhook(&self, id: Uuid) -> AppResult<bool>;

    async fn active_webhooks_for_event(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>>;

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> AppResult<()>;

    async fn list_deliveries(&self, webhook_id: Uuid) -> AppResult<Vec<WebhookDelivery>>;

    /// Increment the success or failure counter and stamp `last_triggered_at`.
    async fn record_delivery_outcome(
        &self,
        webhook_id: Uuid,
        success: bool,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    // --- admin -------------------------------------------------------------

    async fn find_admin(&self, id: Uuid) -> AppResult<Option<AdminUser>>;

    async fn find_admin_by_email(&self, email: &str) -> AppResult<Option<AdminUser>>;

    /// Persist TOTP state. `Some(secret)` enables, `None` disables and clears
    /// the secret; the two fields always change together. Returns false if the
    /// admin does not exist.
    async fn set_admin_totp(&self, admin_id: Uuid, secret: Option<String>) -> AppResult<bool>;

    /// Find the admin by email, creating the record with the default role on
    /// first login. Stamps `last_login_at` either way.
    async fn upsert_admin_login(
        &self,
        email: &str,
        default_role: &str,
        now: DateTime<Utc>,
    ) -> AppResult<AdminUser>;

    /// Insert the role taxonomy if the roles table is empty; no-op otherwise.
    async fn seed_roles_if_empty(&self, roles: &[(&str, &str)]) -> AppResult<()>;

    /// Delete any prior code for the email, then insert the new one.
    async fn replace_verification_code(&self, code: &VerificationCode) -> AppResult<()>;

    async fn find_verification_code(&self, email: &str) -> AppResult<Option<VerificationCode>>;

    async fn delete_verification_code(&self, id: Uuid) -> AppResult<()>;

    async fn insert_session(&self, session: &AdminSession) -> AppResult<()>;

    async fn insert_audit(&self, record: &AuditRecord) -> AppResult<()>;

    /// Delete expired verification codes and sessions. Returns
    /// `(codes_deleted, sessions_deleted)`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<(u64, u64)>;
}
