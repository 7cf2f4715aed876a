//! API key model and scope whitelist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default per-minute rate limit for newly created keys.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: i32 = 60;
/// Default per-day rate limit for newly created keys.
pub const DEFAULT_RATE_LIMIT_PER_DAY: i32 = 10_000;

/// Capabilities an API key can be granted.
///
/// Any scope outside this whitelist is rejected at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyScope {
    Verify,
    Audit,
    ExtractMetadata,
    WebhookManage,
}

impl ApiKeyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Audit => "audit",
            Self::ExtractMetadata => "extract_metadata",
            Self::WebhookManage => "webhook_manage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "verify" => Some(Self::Verify),
            "audit" => Some(Self::Audit),
            "extract_metadata" => Some(Self::ExtractMetadata),
            "webhook_manage" => Some(Self::WebhookManage),
            _ => None,
        }
    }

    /// Join scopes for storage as a single column.
    pub fn join(scopes: &[Self]) -> String {
        scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Split a stored scope column back into the enum set.
    /// Unknown values are dropped (they cannot have been written by this code).
    pub fn split(stored: &str) -> Vec<Self> {
        stored.split(',').filter_map(Self::parse).collect()
    }
}

impl std::fmt::Display for ApiKeyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Environment partition a key belongs to, reflected in its `fus_live_` /
/// `fus_test_` secret prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPrefix {
    Live,
    Test,
}

impl KeyPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "live" => Some(Self::Live),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    /// The literal prefix of a full plaintext key.
    pub fn secret_prefix(&self) -> &'static str {
        match self {
            Self::Live => "fus_live_",
            Self::Test => "fus_test_",
        }
    }
}

/// API key stored in the database. The plaintext secret is never persisted;
/// only its SHA-256 digest and last four characters are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub environment_id: Uuid,
    /// Human-readable name (e.g., "CI - GitHub Actions")
    pub name: String,
    pub key_prefix: KeyPrefix,
    /// SHA-256 hex digest of the full key
    pub key_hash: String,
    /// Last 4 characters of the full key, for display
    pub key_secret_last4: String,
    pub scopes: Vec<ApiKeyScope>,
    pub rate_limit_per_minute: i32,
    pub rate_limit_per_day: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Terminal once set; a revoked key cannot be rotated or restored
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
}

impl ApiKey {
    /// Check if the key has been revoked (terminal state).
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Caller information resolved from a presented API key.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedCaller {
    pub key_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub scopes: Vec<ApiKeyScope>,
}

impl AuthenticatedCaller {
    /// Check if the caller holds a scope.
    pub fn has_scope(&self, scope: ApiKeyScope) -> bool {
        self.scopes.contains(&scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_round_trip() {
        let scopes = vec![ApiKeyScope::Verify, ApiKeyScope::WebhookManage];
        let joined = ApiKeyScope::join(&scopes);
        assert_eq!(joined, "verify,webhook_manage");
        assert_eq!(ApiKeyScope::split(&joined), scopes);
    }

    #[test]
    fn test_scope_parse_rejects_unknown() {
        assert_eq!(ApiKeyScope::parse("delete_everything"), None);
        assert_eq!(ApiKeyScope::parse("VERIFY"), None);
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(KeyPrefix::Live.secret_prefix(), "fus_live_");
        assert_eq!(KeyPrefix::Test.secret_prefix(), "fus_test_");
        assert_eq!(KeyPrefix::parse("live"), Some(KeyPrefix::Live));
        assert_eq!(KeyPrefix::parse("prod"), None);
    }
}
