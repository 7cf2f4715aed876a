//! Webhook and delivery-log models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bounded retry behavior for real event deliveries.
///
/// Test deliveries are always single-attempt; this policy applies to
/// `dispatch_event` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 60,
        }
    }
}

/// Outbound webhook registration.
///
/// The signing secret is generated once at creation and is not rotatable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub environment_id: Uuid,
    /// Must be an https URL
    pub endpoint_url: String,
    pub event_types: Vec<String>,
    /// `whsec_` + 64 hex chars; shared with the receiver for HMAC verification
    pub signing_secret: String,
    pub is_active: bool,
    pub retry_policy: RetryPolicy,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Webhook {
    /// Check whether this webhook subscribes to an event type.
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.event_types.iter().any(|e| e == event_type)
    }
}

/// Whitelisted partial update of a webhook.
///
/// `signing_secret` and `organization_id` are deliberately unreachable
/// through this type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPatch {
    pub endpoint_url: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub retry_policy: Option<RetryPolicy>,
}

impl WebhookPatch {
    pub fn is_empty(&self) -> bool {
        self.endpoint_url.is_none()
            && self.event_types.is_none()
            && self.is_active.is_none()
            && self.retry_policy.is_none()
    }
}

/// One row per delivery attempt, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    /// HTTP status of the remote response; 0 for transport-level failure
    pub response_status: i32,
    pub response_time_ms: i64,
    pub attempt_number: i32,
    pub delivered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_secs, 60);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(WebhookPatch::default().is_empty());
        let patch = WebhookPatch {
            is_active: Some(false),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
