//! SeaORM-backed [`CredentialStore`] implementation for PostgreSQL.
//!
//! Lifecycle transitions use conditional `UPDATE ... WHERE` statements checked
//! via `rows_affected`, so two concurrent revoke or rotate attempts on the
//! same key cannot both pass a read-then-check window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::db::CredentialStore;
use crate::entity;
use crate::error::{AppError, AppResult};
use crate::models::{
    AdminSession, AdminUser, ApiKey, ApiKeyScope, AuditRecord, KeyPrefix, Organization,
    RetryPolicy, TenantEnvironment, VerificationCode, Webhook, WebhookDelivery, WebhookPatch,
};

/// PostgreSQL credential store.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        self.db.ping().await?;
        Ok(())
    }

    // --- tenants -----------------------------------------------------------

    async fn insert_organization(&self, org: &Organization) -> AppResult<()> {
        let model = entity::organization::ActiveModel {
            id: Set(org.id),
            name: Set(org.name.clone()),
            slug: Set(org.slug.clone()),
            created_at: Set(org.created_at),
        };
        entity::organization::Entity::insert(model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_environment(&self, env: &TenantEnvironment) -> AppResult<()> {
        let model = entity::environment::ActiveModel {
            id: Set(env.id),
            organization_id: Set(env.organization_id),
            name: Set(env.name.clone()),
            is_production: Set(env.is_production),
            created_at: Set(env.created_at),
        };
        entity::environment::Entity::insert(model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn find_environment(&self, id: Uuid) -> AppResult<Option<TenantEnvironment>> {
        let result = entity::environment::Entity::find_by_id(id)
            .one(&self.db)
            .await?;
        Ok(result.map(|m| TenantEnvironment {
            id: m.id,
            organization_id: m.organization_id,
            name: m.name,
            is_production: m.is_production,
            created_at: m.created_at,
        }))
    }

    // --- API keys ----------------------------------------------------------

    async fn insert_api_key(&self, key: &ApiKey) -> AppResult<()> {
        let model = entity::api_key::ActiveModel {
            id: Set(key.id),
            organization_id: Set(key.organization_id),
            environment_id: Set(key.environment_id),
            name: Set(key.name.clone()),
            key_prefix: Set(key.key_prefix.as_str().to_string()),
            key_hash: Set(key.key_hash.clone()),
            key_secret_last4: Set(key.key_secret_last4.clone()),
            scopes: Set(ApiKeyScope::join(&key.scopes)),
            rate_limit_per_minute: Set(key.rate_limit_per_minute),
            rate_limit_per_day: Set(key.rate_limit_per_day),
            is_active: Set(key.is_active),
            created_at: Set(key.created_at),
            revoked_at: Set(key.revoked_at),
            revoked_by: Set(key.revoked_by.clone()),
        };
        entity::api_key::Entity::insert(model).exec(&self.db).await?;
        Ok(())
    }

    async fn find_api_key(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<ApiKey>> {
        let result = entity::api_key::Entity::find_by_id(id)
            .filter(entity::api_key::Column::OrganizationId.eq(organization_id))
            .one(&self.db)
            .await?;
        Ok(result.map(model_to_api_key))
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> AppResult<Option<ApiKey>> {
        let result = entity::api_key::Entity::find()
            .filter(entity::api_key::Column::KeyHash.eq(key_hash))
            .one(&self.db)
            .await?;
        Ok(result.map(model_to_api_key))
    }

    async fn list_api_keys(&self, organization_id: Uuid) -> AppResult<Vec<ApiKey>> {
        let results = entity::api_key::Entity::find()
            .filter(entity::api_key::Column::OrganizationId.eq(organization_id))
            .order_by_desc(entity::api_key::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(results.into_iter().map(model_to_api_key).collect())
    }

    async fn revoke_api_key(
        &self,
        id: Uuid,
        organization_id: Uuid,
        revoked_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        // Single conditional UPDATE; the WHERE clause is the state check.
        let result = entity::api_key::Entity::update_many()
            .col_expr(entity::api_key::Column::IsActive, Expr::value(false))
            .col_expr(entity::api_key::Column::RevokedAt, Expr::value(Some(now)))
            .col_expr(
                entity::api_key::Column::RevokedBy,
                Expr::value(Some(revoked_by.to_string())),
            )
            .filter(entity::api_key::Column::Id.eq(id))
            .filter(entity::api_key::Column::OrganizationId.eq(organization_id))
            .filter(entity::api_key::Column::RevokedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    // --- webhooks ----------------------------------------------------------

    async fn insert_webhook(&self, webhook: &Webhook) -> AppResult<()> {
        let model = entity::webhook::ActiveModel {
            id: Set(webhook.id),
            organization_id: Set(webhook.organization_id),
            environment_id: Set(webhook.environment_id),
            endpoint_url: Set(webhook.endpoint_url.clone()),
            event_types: Set(webhook.event_types.join(",")),
            signing_secret: Set(webhook.signing_secret.clone()),
            is_active: Set(webhook.is_active),
            retry_max_attempts: Set(webhook.retry_policy.max_attempts as i32),
            retry_backoff_secs: Set(webhook.retry_policy.backoff_secs as i64),
            success_count: Set(webhook.success_count),
            failure_count: Set(webhook.failure_count),
            last_triggered_at: Set(webhook.last_triggered_at),
            created_at: Set(webhook.created_at),
        };
        entity::webhook::Entity::insert(model).exec(&self.db).await?;
        Ok(())
    }

    async fn find_webhook(&self, id: Uuid) -> AppResult<Option<Webhook>> {
        let result = entity::webhook::Entity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(model_to_webhook))
    }

    async fn update_webhook(&self, id: Uuid, patch: &WebhookPatch) -> AppResult<Option<Webhook>> {
        let Some(model) = entity::webhook::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut active: entity::webhook::ActiveModel = model.into();
        if let Some(ref url) = patch.endpoint_url {
            active.endpoint_url = Set(url.clone());
        }
        if let Some(ref events) = patch.event_types {
            active.event_types = Set(events.join(","));
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(policy) = patch.retry_policy {
            active.retry_max_attempts = Set(policy.max_attempts as i32);
            active.retry_backoff_secs = Set(policy.backoff_secs as i64);
        }
        let updated = active.update(&self.db).await?;
        Ok(Some(model_to_webhook(updated)))
    }

    async fn delete_webhook(&self, id: Uuid) -> AppResult<bool> {
        let result = entity::webhook::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn active_webhooks_for_event(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>> {
        // Subscription filtering happens in Rust; the comma-joined column does
        // not support an indexed containment query.
        let results = entity::webhook::Entity::find()
            .filter(entity::webhook::Column::OrganizationId.eq(organization_id))
            .filter(entity::webhook::Column::IsActive.eq(true))
            .all(&self.db)
            .await?;
        Ok(results
            .into_iter()
            .map(model_to_webhook)
            .filter(|w| w.subscribes_to(event_type))
            .collect())
    }

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> AppResult<()> {
        let model = entity::webhook_delivery::ActiveModel {
            id: Set(delivery.id),
            webhook_id: Set(delivery.webhook_id),
            event_type: Set(delivery.event_type.clone()),
            payload: Set(delivery.payload.clone()),
            response_status: Set(delivery.response_status),
            response_time_ms: Set(delivery.response_time_ms),
            attempt_number: Set(delivery.attempt_number),
            delivered_at: Set(delivery.delivered_at),
        };
        entity::webhook_delivery::Entity::insert(model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn list_deliveries(&self, webhook_id: Uuid) -> AppResult<Vec<WebhookDelivery>> {
        let results = entity::webhook_delivery::Entity::find()
            .filter(entity::webhook_delivery::Column::WebhookId.eq(webhook_id))
            .order_by_desc(entity::webhook_delivery::Column::DeliveredAt)
            .all(&self.db)
            .await?;
        Ok(results
            .into_iter()
            .map(|m| WebhookDelivery {
                id: m.id,
                webhook_id: m.webhook_id,
                event_type: m.event_type,
                payload: m.payload,
                response_status: m.response_status,
                response_time_ms: m.response_time_ms,
                attempt_number: m.attempt_number,
                delivered_at: m.delivered_at,
            })
            .collect())
    }

    async fn record_delivery_outcome(
        &self,
        webhook_id: Uuid,
        success: bool,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let counter = if success {
            entity::webhook::Column::SuccessCount
        } else {
            entity::webhook::Column::FailureCount
        };
        entity::webhook::Entity::update_many()
            .col_expr(counter, Expr::col(counter).add(1))
            .col_expr(
                entity::webhook::Column::LastTriggeredAt,
                Expr::value(Some(now)),
            )
            .filter(entity::webhook::Column::Id.eq(webhook_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    // --- admin -------------------------------------------------------------

    async fn find_admin(&self, id: Uuid) -> AppResult<Option<AdminUser>> {
        let result = entity::admin_user::Entity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(model_to_admin))
    }

    async fn find_admin_by_email(&self, email: &str) -> AppResult<Option<AdminUser>> {
        let result = entity::admin_user::Entity::find()
            .filter(entity::admin_user::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(result.map(model_to_admin))
    }

    async fn set_admin_totp(&self, admin_id: Uuid, secret: Option<String>) -> AppResult<bool> {
        let enabled = secret.is_some();
        let result = entity::admin_user::Entity::update_many()
            .col_expr(entity::admin_user::Column::TotpSecret, Expr::value(secret))
            .col_expr(entity::admin_user::Column::TotpEnabled, Expr::value(enabled))
            .filter(entity::admin_user::Column::Id.eq(admin_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn upsert_admin_login(
        &self,
        email: &str,
        default_role: &str,
        now: DateTime<Utc>,
    ) -> AppResult<AdminUser> {
        let existing = entity::admin_user::Entity::find()
            .filter(entity::admin_user::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        if let Some(m) = existing {
            let mut active: entity::admin_user::ActiveModel = m.into();
            active.last_login_at = Set(Some(now));
            let updated = active.update(&self.db).await?;
            return Ok(model_to_admin(updated));
        }

        let id = Uuid::new_v4();
        let model = entity::admin_user::ActiveModel {
            id: Set(id),
            email: Set(email.to_string()),
            role: Set(default_role.to_string()),
            totp_secret: Set(None),
            totp_enabled: Set(false),
            created_at: Set(now),
            last_login_at: Set(Some(now)),
        };
        entity::admin_user::Entity::insert(model).exec(&self.db).await?;

        let inserted = entity::admin_user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                AppError::Database("Failed to fetch newly inserted admin user".to_string())
            })?;
        Ok(model_to_admin(inserted))
    }

    async fn seed_roles_if_empty(&self, roles: &[(&str, &str)]) -> AppResult<()> {
        let count = entity::admin_role::Entity::find().count(&self.db).await?;
        if count > 0 {
            return Ok(());
        }
        for (name, description) in roles {
            let model = entity::admin_role::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set((*name).to_string()),
                description: Set((*description).to_string()),
            };
            entity::admin_role::Entity::insert(model).exec(&self.db).await?;
        }
        Ok(())
    }

    async fn replace_verification_code(&self, code: &VerificationCode) -> AppResult<()> {
        // Clear any unconsumed code before inserting - one live code per email.
        entity::admin_verification_code::Entity::delete_many()
            .filter(entity::admin_verification_code::Column::Email.eq(&code.email))
            .exec(&self.db)
            .await?;

        let model = entity::admin_verification_code::ActiveModel {
            id: Set(code.id),
            email: Set(code.email.clone()),
            code_hash: Set(code.code_hash.clone()),
            expires_at: Set(code.expires_at),
            created_at: Set(code.created_at),
        };
        entity::admin_verification_code::Entity::insert(model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn find_verification_code(&self, email: &str) -> AppResult<Option<VerificationCode>> {
        let result = entity::admin_verification_code::Entity::find()
            .filter(entity::admin_verification_code::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(result.map(|m| VerificationCode {
            id: m.id,
            email: m.email,
            code_hash: m.code_hash,
            expires_at: m.expires_at,
            created_at: m.created_at,
        }))
    }

    async fn delete_verification_code(&self, id: Uuid) -> AppResult<()> {
        entity::admin_verification_code::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_session(&self, session: &AdminSession) -> AppResult<()> {
        let model = entity::admin_session::ActiveModel {
            id: Set(session.id),
            admin_id: Set(session.admin_id),
            token_hash: Set(session.token_hash.clone()),
            expires_at: Set(session.expires_at),
            created_at: Set(session.created_at),
        };
        entity::admin_session::Entity::insert(model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_audit(&self, record: &AuditRecord) -> AppResult<()> {
        let model = entity::audit_log::ActiveModel {
            id: Set(record.id),
            admin_id: Set(record.admin_id),
            action: Set(record.action.clone()),
            detail: Set(record.detail.clone()),
            integrity_hash: Set(record.integrity_hash.clone()),
            created_at: Set(record.created_at),
        };
        entity::audit_log::Entity::insert(model).exec(&self.db).await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<(u64, u64)> {
        let codes = entity::admin_verification_code::Entity::delete_many()
            .filter(entity::admin_verification_code::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        let sessions = entity::admin_session::Entity::delete_many()
            .filter(entity::admin_session::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        Ok((codes.rows_affected, sessions.rows_affected))
    }
}

// --- mapping helpers -------------------------------------------------------

fn model_to_api_key(m: entity::api_key::Model) -> ApiKey {
    ApiKey {
        id: m.id,
        organization_id: m.organization_id,
        environment_id: m.environment_id,
        name: m.name,
        key_prefix: KeyPrefix::parse(&m.key_prefix).unwrap_or(KeyPrefix::Test),
        key_hash: m.key_hash,
        key_secret_last4: m.key_secret_last4,
        scopes: ApiKeyScope::split(&m.scopes),
        rate_limit_per_minute: m.rate_limit_per_minute,
        rate_limit_per_day: m.rate_limit_per_day,
        is_active: m.is_active,
        created_at: m.created_at,
        revoked_at: m.revoked_at,
        revoked_by: m.revoked_by,
    }
}

fn model_to_webhook(m: entity::webhook::Model) -> Webhook {
    Webhook {
        id: m.id,
        organization_id: m.organization_id,
        environment_id: m.environment_id,
        endpoint_url: m.endpoint_url,
        event_types: m
            .event_types
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        signing_secret: m.signing_secret,
        is_active: m.is_active,
        retry_policy: RetryPolicy {
            max_attempts: std::cmp::Ord::max(m.retry_max_attempts, 1) as u32,
            backoff_secs: std::cmp::Ord::max(m.retry_backoff_secs, 0) as u64,
        },
        success_count: m.success_count,
        failure_count: m.failure_count,
        last_triggered_at: m.last_triggered_at,
        created_at: m.created_at,
    }
}

fn model_to_admin(m: entity::admin_user::Model) -> AdminUser {
    AdminUser {
        id: m.id,
        email: m.email,
        role: m.role,
        totp_secret: m.totp_secret,
        totp_enabled: m.totp_enabled,
        created_at: m.created_at,
        last_login_at: m.last_login_at,
    }
}
