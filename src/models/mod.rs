//! Domain models for the Fusion credential service.

pub mod admin;
pub mod api_key;
pub mod tenant;
pub mod webhook;

pub use admin::{AdminSession, AdminUser, AuditRecord, VerificationCode, DEFAULT_ADMIN_ROLE, ROLE_SEED};
pub use api_key::{ApiKey, ApiKeyScope, AuthenticatedCaller, KeyPrefix};
pub use tenant::{Organization, TenantEnvironment};
pub use webhook::{RetryPolicy, Webhook, WebhookDelivery, WebhookPatch};
