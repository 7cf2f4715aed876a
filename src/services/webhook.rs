//! Webhook lifecycle and outbound delivery.
//!
//! Payloads are signed with HMAC-SHA256 over the serialized JSON body using
//! the webhook's signing secret. The secret is generated once at creation and
//! is not rotatable. Real event dispatch honors the stored retry policy;
//! a test delivery is a single-attempt connectivity probe.

use std::time::{Duration, Instant};

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::{EVENT_HEADER, SIGNATURE_HEADER};
use crate::db::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::models::{RetryPolicy, Webhook, WebhookDelivery, WebhookPatch};
use crate::services::secrets;

type HmacSha256 = Hmac<Sha256>;

/// Timeout for one outbound delivery attempt.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on delivery attempts per event.
const MAX_RETRY_ATTEMPTS: u32 = 10;
/// Upper bound on the fixed backoff between attempts (one hour).
const MAX_BACKOFF_SECS: u64 = 3_600;

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryOutcome {
    /// Remote HTTP status; 0 for transport-level failure
    pub response_status: i32,
    pub response_time_ms: i64,
    pub success: bool,
}

/// Compute the `X-Fusion-Signature` value for a serialized payload.
pub fn sign_payload(signing_secret: &str, serialized: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(serialized.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Validate that an endpoint is a well-formed https URL.
fn validate_endpoint_url(endpoint_url: &str) -> AppResult<()> {
    let parsed = url::Url::parse(endpoint_url)
        .map_err(|_| AppError::InvalidInput("endpoint URL is malformed".to_string()))?;
    if parsed.scheme() != "https" {
        return Err(AppError::InvalidInput(
            "endpoint URL must use https".to_string(),
        ));
    }
    Ok(())
}

/// Stored policies drive the dispatch retry loop; values outside these
/// bounds never reach it.
fn validate_retry_policy(policy: &RetryPolicy) -> AppResult<()> {
    if policy.max_attempts == 0 || policy.max_attempts > MAX_RETRY_ATTEMPTS {
        return Err(AppError::InvalidInput(format!(
            "retry policy max_attempts must be between 1 and {}",
            MAX_RETRY_ATTEMPTS
        )));
    }
    if policy.backoff_secs > MAX_BACKOFF_SECS {
        return Err(AppError::InvalidInput(format!(
            "retry policy backoff_secs must be at most {}",
            MAX_BACKOFF_SECS
        )));
    }
    Ok(())
}

fn validate_event_types(event_types: &[String]) -> AppResult<()> {
    if event_types.is_empty() || event_types.iter().any(|e| e.trim().is_empty()) {
        return Err(AppError::InvalidInput(
            "at least one non-empty event type is required".to_string(),
        ));
    }
    Ok(())
}

/// Register a new webhook. The signing secret is generated here and returned
/// to the caller exactly once as part of the record.
pub async fn create_webhook(
    store: &dyn CredentialStore,
    organization_id: Uuid,
    environment_id: Uuid,
    endpoint_url: &str,
    event_types: Vec<String>,
    retry_policy: Option<RetryPolicy>,
) -> AppResult<Webhook> {
    validate_endpoint_url(endpoint_url)?;
    validate_event_types(&event_types)?;
    if let Some(ref policy) = retry_policy {
        validate_retry_policy(policy)?;
    }

    store
        .find_environment(environment_id)
        .await?
        .filter(|e| e.organization_id == organization_id)
        .ok_or_else(|| AppError::NotFound(format!("Environment {}", environment_id)))?;

    let webhook = Webhook {
        id: Uuid::new_v4(),
        organization_id,
        environment_id,
        endpoint_url: endpoint_url.to_string(),
        event_types,
        signing_secret: secrets::signing_secret(),
        is_active: true,
        retry_policy: retry_policy.unwrap_or_default(),
        success_count: 0,
        failure_count: 0,
        last_triggered_at: None,
        created_at: Utc::now(),
    };
    store.insert_webhook(&webhook).await?;
    tracing::info!(webhook_id = %webhook.id, org = %organization_id, "webhook created");

    Ok(webhook)
}

/// Apply a whitelisted partial update. Only `endpoint_url`, `event_types`,
/// `is_active`, and `retry_policy` are reachable; the signing secret and
/// owning organization are not.
pub async fn update_webhook(
    store: &dyn CredentialStore,
    webhook_id: Uuid,
    patch: WebhookPatch,
) -> AppResult<Webhook> {
    if patch.is_empty() {
        return Err(AppError::InvalidInput(
            "no updatable fields provided".to_string(),
        ));
    }
    if let Some(ref url) = patch.endpoint_url {
        validate_endpoint_url(url)?;
    }
    if let Some(ref events) = patch.event_types {
        validate_event_types(events)?;
    }
    if let Some(ref policy) = patch.retry_policy {
        validate_retry_policy(policy)?;
    }

    store
        .update_webhook(webhook_id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Webhook {}", webhook_id)))
}

/// Hard-delete a webhook; its delivery history goes with it.
pub async fn delete_webhook(store: &dyn CredentialStore, webhook_id: Uuid) -> AppResult<()> {
    if !store.delete_webhook(webhook_id).await? {
        return Err(AppError::NotFound(format!("Webhook {}", webhook_id)));
    }
    tracing::info!(webhook_id = %webhook_id, "webhook deleted");
    Ok(())
}

/// Perform one signed POST to the webhook endpoint and measure it.
async fn send_once(
    client: &reqwest::Client,
    webhook: &Webhook,
    event_type: &str,
    serialized: &str,
    signature: &str,
) -> DeliveryOutcome {
    let start = Instant::now();
    let result = client
        .post(&webhook.endpoint_url)
        .header("Content-Type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(EVENT_HEADER, event_type)
        .timeout(DELIVERY_TIMEOUT)
        .body(serialized.to_string())
        .send()
        .await;
    let elapsed_ms = start.elapsed().as_millis() as i64;

    match result {
        Ok(response) => {
            let status = response.status().as_u16() as i32;
            DeliveryOutcome {
                response_status: status,
                response_time_ms: elapsed_ms,
                success: (200..300).contains(&status),
            }
        }
        Err(err) => {
            tracing::warn!(webhook_id = %webhook.id, error = %err, "webhook delivery transport failure");
            DeliveryOutcome {
                response_status: 0,
                response_time_ms: elapsed_ms,
                success: false,
            }
        }
    }
}

async fn record_attempt(
    store: &dyn CredentialStore,
    webhook: &Webhook,
    event_type: &str,
    payload: &serde_json::Value,
    outcome: DeliveryOutcome,
    attempt_number: i32,
) -> AppResult<()> {
    store
        .insert_delivery(&WebhookDelivery {
            id: Uuid::new_v4(),
            webhook_id: webhook.id,
            event_type: event_type.to_string(),
            payload: payload.clone(),
            response_status: outcome.response_status,
            response_time_ms: outcome.response_time_ms,
            attempt_number,
            delivered_at: Utc::now(),
        })
        .await
}

/// Send a single-attempt test delivery to a webhook.
///
/// Always records one delivery row and bumps exactly one counter. A remote
/// HTTP error surfaces as a normal outcome (`success: false`); a transport
/// failure is returned as a `Delivery` error after the counters are updated.
pub async fn send_test(
    store: &dyn CredentialStore,
    client: &reqwest::Client,
    webhook_id: Uuid,
) -> AppResult<DeliveryOutcome> {
    let webhook = store
        .find_webhook(webhook_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Webhook {}", webhook_id)))?;

    let payload = json!({
        "event": "webhook.test",
        "timestamp": Utc::now().to_rfc3339(),
        "data": {
            "message": "Test delivery from Fusion",
            "webhook_id": webhook.id,
        },
    });
    let serialized = serde_json::to_string(&payload)?;
    let signature = sign_payload(&webhook.signing_secret, &serialized);

    let outcome = send_once(client, &webhook, "webhook.test", &serialized, &signature).await;

    record_attempt(store, &webhook, "webhook.test", &payload, outcome, 1).await?;
    store
        .record_delivery_outcome(webhook.id, outcome.success, Utc::now())
        .await?;

    if outcome.response_status == 0 {
        // Transport failure: distinct from a remote HTTP error, which is
        // reported as a 200 to the caller with success=false.
        return Err(AppError::Delivery(format!(
            "could not reach {}",
            webhook.endpoint_url
        )));
    }

    Ok(outcome)
}

/// Deliver a real event to every active webhook subscribed to its type,
/// honoring each webhook's stored retry policy.
///
/// One delivery row is appended per attempt; each webhook's counters move
/// once, by the final outcome. Returns the number of webhooks that accepted
/// the event.
pub async fn dispatch_event(
    store: &dyn CredentialStore,
    client: &reqwest::Client,
    organization_id: Uuid,
    event_type: &str,
    data: serde_json::Value,
) -> AppResult<u32> {
    let webhooks = store
        .active_webhooks_for_event(organization_id, event_type)
        .await?;

    let mut delivered = 0;
    for webhook in &webhooks {
        let payload = json!({
            "event": event_type,
            "timestamp": Utc::now().to_rfc3339(),
            "data": data,
        });
        let serialized = serde_json::to_string(&payload)?;
        let signature = sign_payload(&webhook.signing_secret, &serialized);

        let max_attempts = webhook.retry_policy.max_attempts.max(1);
        let mut succeeded = false;
        for attempt in 1..=max_attempts {
            let outcome = send_once(client, webhook, event_type, &serialized, &signature).await;
            record_attempt(store, webhook, event_type, &payload, outcome, attempt as i32).await?;

            if outcome.success {
                succeeded = true;
                break;
            }
            if attempt < max_attempts {
                tokio::time::sleep(Duration::from_secs(webhook.retry_policy.backoff_secs)).await;
            }
        }

        store
            .record_delivery_outcome(webhook.id, succeeded, Utc::now())
            .await?;
        if succeeded {
            delivered += 1;
        }
    }

    Ok(delivered)
}
