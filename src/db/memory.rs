//! In-memory [`CredentialStore`] backend.
//!
//! Used by the test suites and for database-less local runs. Mutex-guarded
//! maps; the conditional-update semantics match the PostgreSQL backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    AdminSession, AdminUser, ApiKey, AuditRecord, Organization, TenantEnvironment,
    VerificationCode, Webhook, WebhookDelivery, WebhookPatch,
};

#[derive(Default)]
struct Inner {
    organizations: HashMap<Uuid, Organization>,
    environments: HashMap<Uuid, TenantEnvironment>,
    api_keys: HashMap<Uuid, ApiKey>,
    webhooks: HashMap<Uuid, Webhook>,
    deliveries: Vec<WebhookDelivery>,
    admins: HashMap<Uuid, AdminUser>,
    roles: Vec<(String, String)>,
    codes: HashMap<Uuid, VerificationCode>,
    sessions: HashMap<Uuid, AdminSession>,
    audit: Vec<AuditRecord>,
}

/// Mutex-guarded in-memory credential store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Database("Memory store mutex poisoned".to_string()))
    }

    /// Snapshot of the audit trail, for assertions in tests.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.inner
            .lock()
            .map(|inner| inner.audit.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the seeded role names, for assertions in tests.
    pub fn role_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.roles.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.lock().map(|_| ())
    }

    async fn insert_organization(&self, org: &Organization) -> AppResult<()> {
        self.lock()?.organizations.insert(org.id, org.clone());
        Ok(())
    }

    async fn insert_environment(&self, env: &TenantEnvironment) -> AppResult<()> {
        self.lock()?.environments.insert(env.id, env.clone());
        Ok(())
    }

    async fn find_environment(&self, id: Uuid) -> AppResult<Option<TenantEnvironment>> {
        Ok(self.lock()?.environments.get(&id).cloned())
    }

    async fn insert_api_key(&self, key: &ApiKey) -> AppResult<()> {
        self.lock()?.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn find_api_key(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<ApiKey>> {
        Ok(self
            .lock()?
            .api_keys
            .get(&id)
            .filter(|k| k.organization_id == organization_id)
            .cloned())
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>> {
        Ok(self
            .lock()?
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn list_api_keys(&self, organization_id: Uuid) -> AppResult<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self
            .lock()?
            .api_keys
            .values()
            .filter(|k| k.organization_id == organization_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn revoke_api_key(
        &self,
        id: Uuid,
        organization_id: Uuid,
        revoked_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut inner = self.lock()?;
        match inner.api_keys.get_mut(&id) {
            Some(key) if key.organization_id == organization_id && key.revoked_at.is_none() => {
                key.is_active = false;
                key.revoked_at = Some(now);
                key.revoked_by = Some(revoked_by.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_webhook(&self, webhook: &Webhook) -> AppResult<()> {
        self.lock()?.webhooks.insert(webhook.id, webhook.clone());
        Ok(())
    }

    async fn find_webhook(&self, id: Uuid) -> AppResult<Option<Webhook>> {
        Ok(self.lock()?.webhooks.get(&id).cloned())
    }

    async fn update_webhook(&self, id: Uuid, patch: &WebhookPatch) -> AppResult<Option<Webhook>> {
        let mut inner = self.lock()?;
        let Some(webhook) = inner.webhooks.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(ref url) = patch.endpoint_url {
            webhook.endpoint_url = url.clone();
        }
        if let Some(ref events) = patch.event_types {
            webhook.event_types = events.clone();
        }
        if let Some(is_active) = patch.is_active {
            webhook.is_active = is_active;
        }
        if let Some(policy) = patch.retry_policy {
            webhook.retry_policy = policy;
        }
        Ok(Some(webhook.clone()))
    }

    async fn delete_webhook(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let removed = inner.webhooks.remove(&id).is_some();
        if removed {
            // cascade, matching the PostgreSQL foreign key
            inner.deliveries.retain(|d| d.webhook_id != id);
        }
        Ok(removed)
    }

    async fn active_webhooks_for_event(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>> {
        Ok(self
            .lock()?
            .webhooks
            .values()
            .filter(|w| {
                w.organization_id == organization_id && w.is_active && w.subscribes_to(event_type)
            })
            .cloned()
            .collect())
    }

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> AppResult<()> {
        self.lock()?.deliveries.push(delivery.clone());
        Ok(())
    }

    async fn list_deliveries(&self, webhook_id: Uuid) -> AppResult<Vec<WebhookDelivery>> {
        let mut rows: Vec<WebhookDelivery> = self
            .lock()?
            .deliveries
            .iter()
            .filter(|d| d.webhook_id == webhook_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.delivered_at.cmp(&a.delivered_at));
        Ok(rows)
    }

    async fn record_delivery_outcome(
        &self,
        webhook_id: Uuid,
        success: bool,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut inner = self.lock()?;
        if let Some(webhook) = inner.webhooks.get_mut(&webhook_id) {
            if success {
                webhook.success_count += 1;
            } else {
                webhook.failure_count += 1;
            }
            webhook.last_triggered_at = Some(now);
        }
        Ok(())
    }

    async fn find_admin(&self, id: Uuid) -> AppResult<Option<AdminUser>> {
        Ok(self.lock()?.admins.get(&id).cloned())
    }

    async fn find_admin_by_email(&self, email: &str) -> AppResult<Option<AdminUser>> {
        Ok(self
            .lock()?
            .admins
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn set_admin_totp(&self, admin_id: Uuid, secret: Option<String>) -> AppResult<bool> {
        let mut inner = self.lock()?;
        match inner.admins.get_mut(&admin_id) {
            Some(admin) => {
                admin.totp_enabled = secret.is_some();
                admin.totp_secret = secret;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_admin_login(
        &self,
        email: &str,
        default_role: &str,
        now: DateTime<Utc>,
    ) -> AppResult<AdminUser> {
        let mut inner = self.lock()?;
        if let Some(admin) = inner.admins.values_mut().find(|a| a.email == email) {
            admin.last_login_at = Some(now);
            return Ok(admin.clone());
        }
        let admin = AdminUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: default_role.to_string(),
            totp_secret: None,
            totp_enabled: false,
            created_at: now,
            last_login_at: Some(now),
        };
        inner.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn seed_roles_if_empty(&self, roles: &[(&str, &str)]) -> AppResult<()> {
        let mut inner = self.lock()?;
        if inner.roles.is_empty() {
            inner.roles = roles
                .iter()
                .map(|(n, d)| ((*n).to_string(), (*d).to_string()))
                .collect();
        }
        Ok(())
    }

    async fn replace_verification_code(&self, code: &VerificationCode) -> AppResult<()> {
        let mut inner = self.lock()?;
        inner.codes.retain(|_, c| c.email != code.email);
        inner.codes.insert(code.id, code.clone());
        Ok(())
    }

    async fn find_verification_code(&self, email: &str) -> AppResult<Option<VerificationCode>> {
        Ok(self
            .lock()?
            .codes
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn delete_verification_code(&self, id: Uuid) -> AppResult<()> {
        self.lock()?.codes.remove(&id);
        Ok(())
    }

    async fn insert_session(&self, session: &AdminSession) -> AppResult<()> {
        self.lock()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn insert_audit(&self, record: &AuditRecord) -> AppResult<()> {
        self.lock()?.audit.push(record.clone());
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<(u64, u64)> {
        let mut inner = self.lock()?;
        let codes_before = inner.codes.len();
        inner.codes.retain(|_, c| c.expires_at >= now);
        let sessions_before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.expires_at >= now);
        Ok((
            (codes_before - inner.codes.len()) as u64,
            (sessions_before - inner.sessions.len()) as u64,
        ))
    }
}
