//! Tenant models: organization and its environments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant entity owning API keys, webhooks, and environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// URL-safe identifier; uniqueness is guaranteed by a random hex suffix
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Sandbox/production partition within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantEnvironment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub is_production: bool,
    pub created_at: DateTime<Utc>,
}
