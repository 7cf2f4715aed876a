//! Webhook lifecycle and delivery endpoints.

use actix_web::{delete, get, patch, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::SharedStore;
use crate::error::AppResult;
use crate::models::{RetryPolicy, Webhook, WebhookDelivery, WebhookPatch};
use crate::services::webhook;

/// Retry policy as exposed over the wire.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryPolicyBody {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl From<RetryPolicyBody> for RetryPolicy {
    fn from(body: RetryPolicyBody) -> Self {
        Self {
            max_attempts: body.max_attempts,
            backoff_secs: body.backoff_secs,
        }
    }
}

impl From<RetryPolicy> for RetryPolicyBody {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            backoff_secs: policy.backoff_secs,
        }
    }
}

/// Webhook record without the signing secret.
#[derive(Serialize, ToSchema)]
pub struct WebhookSummary {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub environment_id: Uuid,
    pub endpoint_url: String,
    pub event_types: Vec<String>,
    pub is_active: bool,
    pub retry_policy: RetryPolicyBody,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_triggered_at: Option<String>,
    pub created_at: String,
}

impl From<&Webhook> for WebhookSummary {
    fn from(webhook: &Webhook) -> Self {
        Self {
            id: webhook.id,
            organization_id: webhook.organization_id,
            environment_id: webhook.environment_id,
            endpoint_url: webhook.endpoint_url.clone(),
            event_types: webhook.event_types.clone(),
            is_active: webhook.is_active,
            retry_policy: webhook.retry_policy.into(),
            success_count: webhook.success_count,
            failure_count: webhook.failure_count,
            last_triggered_at: webhook.last_triggered_at.map(|t| t.to_rfc3339()),
            created_at: webhook.created_at.to_rfc3339(),
        }
    }
}

/// Request body for registering a webhook.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateWebhookRequest {
    pub organization_id: Uuid,
    pub environment_id: Uuid,
    pub endpoint_url: String,
    pub event_types: Vec<String>,
    pub retry_policy: Option<RetryPolicyBody>,
}

/// Response carrying the signing secret, returned exactly once.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookResponse {
    pub webhook: WebhookSummary,
    pub signing_secret: String,
}

/// Whitelisted partial update body. Unknown fields are rejected; the signing
/// secret and owning organization are not expressible here.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateWebhookRequest {
    pub endpoint_url: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub retry_policy: Option<RetryPolicyBody>,
}

/// Request body for a test delivery.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestWebhookRequest {
    pub webhook_id: Uuid,
}

/// Outcome of a test delivery. `response_status` 0 never appears here; a
/// transport failure is returned as HTTP 500 instead.
#[derive(Serialize, ToSchema)]
pub struct TestWebhookResponse {
    pub response_status: i32,
    pub response_time_ms: i64,
    pub success: bool,
}

/// One recorded delivery attempt.
#[derive(Serialize, ToSchema)]
pub struct DeliverySummary {
    pub id: Uuid,
    pub event_type: String,
    pub response_status: i32,
    pub response_time_ms: i64,
    pub attempt_number: i32,
    pub delivered_at: String,
}

impl From<&WebhookDelivery> for DeliverySummary {
    fn from(d: &WebhookDelivery) -> Self {
        Self {
            id: d.id,
            event_type: d.event_type.clone(),
            response_status: d.response_status,
            response_time_ms: d.response_time_ms,
            attempt_number: d.attempt_number,
            delivered_at: d.delivered_at.to_rfc3339(),
        }
    }
}

/// Delivery history response.
#[derive(Serialize, ToSchema)]
pub struct DeliveryListResponse {
    pub deliveries: Vec<DeliverySummary>,
}

/// Configure webhook routes.
/// Note: the specific `/webhooks/test` path must be registered before the
/// generic `/webhooks/{id}` ones.
pub fn configure_webhook_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_webhook)
        .service(test_webhook)
        .service(list_deliveries)
        .service(update_webhook)
        .service(delete_webhook);
}

/// Register a new webhook.
///
/// POST /webhooks
#[utoipa::path(
    post,
    path = "/api/v1/webhooks",
    tag = "Webhooks",
    request_body = CreateWebhookRequest,
    responses(
        (status = 200, description = "Webhook created; signingSecret is shown only here", body = CreateWebhookResponse),
        (status = 400, description = "Malformed or non-https endpoint URL", body = crate::error::ErrorResponse),
        (status = 404, description = "Environment not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/webhooks")]
pub async fn create_webhook(
    store: web::Data<SharedStore>,
    body: web::Json<CreateWebhookRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let created = webhook::create_webhook(
        store.get_ref().as_ref(),
        req.organization_id,
        req.environment_id,
        &req.endpoint_url,
        req.event_types,
        req.retry_policy.map(RetryPolicy::from),
    )
    .await?;

    Ok(HttpResponse::Ok().json(CreateWebhookResponse {
        signing_secret: created.signing_secret.clone(),
        webhook: WebhookSummary::from(&created),
    }))
}

/// Partially update a webhook.
///
/// PATCH /webhooks/{id}
#[utoipa::path(
    patch,
    path = "/api/v1/webhooks/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook UUID")
    ),
    request_body = UpdateWebhookRequest,
    responses(
        (status = 200, description = "Updated webhook", body = WebhookSummary),
        (status = 400, description = "Empty patch or invalid URL", body = crate::error::ErrorResponse),
        (status = 404, description = "Webhook not found", body = crate::error::ErrorResponse)
    )
)]
#[patch("/webhooks/{id}")]
pub async fn update_webhook(
    store: web::Data<SharedStore>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateWebhookRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let patch = WebhookPatch {
        endpoint_url: req.endpoint_url,
        event_types: req.event_types,
        is_active: req.is_active,
        retry_policy: req.retry_policy.map(RetryPolicy::from),
    };

    let updated = webhook::update_webhook(store.get_ref().as_ref(), path.into_inner(), patch).await?;

    Ok(HttpResponse::Ok().json(WebhookSummary::from(&updated)))
}

/// Delete a webhook and its delivery history.
///
/// DELETE /webhooks/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/webhooks/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook UUID")
    ),
    responses(
        (status = 200, description = "Webhook deleted"),
        (status = 404, description = "Webhook not found", body = crate::error::ErrorResponse)
    )
)]
#[delete("/webhooks/{id}")]
pub async fn delete_webhook(
    store: web::Data<SharedStore>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    webhook::delete_webhook(store.get_ref().as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Webhook deleted" })))
}

/// Send a single-attempt test delivery.
///
/// POST /webhooks/test
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/test",
    tag = "Webhooks",
    request_body = TestWebhookRequest,
    responses(
        (status = 200, description = "Delivery attempted; success reflects the remote status", body = TestWebhookResponse),
        (status = 404, description = "Webhook not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Endpoint unreachable", body = crate::error::ErrorResponse)
    )
)]
#[post("/webhooks/test")]
pub async fn test_webhook(
    store: web::Data<SharedStore>,
    client: web::Data<reqwest::Client>,
    body: web::Json<TestWebhookRequest>,
) -> AppResult<HttpResponse> {
    let outcome =
        webhook::send_test(store.get_ref().as_ref(), client.get_ref(), body.webhook_id).await?;

    Ok(HttpResponse::Ok().json(TestWebhookResponse {
        response_status: outcome.response_status,
        response_time_ms: outcome.response_time_ms,
        success: outcome.success,
    }))
}

/// List delivery attempts for a webhook, newest first.
///
/// GET /webhooks/{id}/deliveries
#[utoipa::path(
    get,
    path = "/api/v1/webhooks/{id}/deliveries",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Webhook UUID")
    ),
    responses(
        (status = 200, description = "Delivery history", body = DeliveryListResponse)
    )
)]
#[get("/webhooks/{id}/deliveries")]
pub async fn list_deliveries(
    store: web::Data<SharedStore>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let deliveries = store.list_deliveries(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(DeliveryListResponse {
        deliveries: deliveries.iter().map(DeliverySummary::from).collect(),
    }))
}
