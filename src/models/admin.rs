//! Admin user, verification-code, session, and audit models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default role assigned on first successful login from the allow-listed domain.
pub const DEFAULT_ADMIN_ROLE: &str = "ops_admin";

/// The lazily-seeded role taxonomy.
pub const ROLE_SEED: &[(&str, &str)] = &[
    ("super_admin", "Full access, including role management"),
    ("ops_admin", "Operational access to credentials and webhooks"),
    ("read_only", "Read-only access to the admin console"),
];

/// Admin console user.
///
/// Invariant: `totp_secret` is non-null only when `totp_enabled` is true;
/// disabling clears the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Short-lived 6-digit login code. At most one unconsumed code per email.
#[derive(Debug, Clone)]
pub struct VerificationCode {
    pub id: Uuid,
    pub email: String,
    /// SHA-256 hex digest of the 6-digit code
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Opaque 24-hour admin session; the token is hashed at rest like API keys.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit trail entry with an integrity hash over
/// `admin_id + timestamp`.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub detail: String,
    pub integrity_hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_code_expiry() {
        let now = Utc::now();
        let code = VerificationCode {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            code_hash: "abc".to_string(),
            expires_at: now + Duration::minutes(5),
            created_at: now,
        };
        assert!(!code.is_expired(now));
        assert!(!code.is_expired(now + Duration::minutes(5)));
        assert!(code.is_expired(now + Duration::minutes(5) + Duration::seconds(1)));
    }
}
