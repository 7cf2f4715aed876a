//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fusion Credential Server",
        version = "0.3.0",
        description = "Credential lifecycle service: API keys, signed webhooks, and admin console authentication"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // API key endpoints
        api::api_keys::create_key,
        api::api_keys::rotate_key,
        api::api_keys::revoke_key,
        api::api_keys::list_keys,
        api::api_keys::verify_caller,
        // Webhook endpoints
        api::webhooks::create_webhook,
        api::webhooks::update_webhook,
        api::webhooks::delete_webhook,
        api::webhooks::test_webhook,
        api::webhooks::list_deliveries,
        // Admin endpoints
        api::admin::generate_totp,
        api::admin::enable_totp,
        api::admin::disable_totp,
        api::admin::send_code,
        api::admin::verify_code,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // API keys
            api::api_keys::ApiKeySummary,
            api::api_keys::CreateKeyRequest,
            api::api_keys::CreateKeyResponse,
            api::api_keys::RotateKeyRequest,
            api::api_keys::RotateKeyResponse,
            api::api_keys::RevokeKeyRequest,
            api::api_keys::MessageResponse,
            api::api_keys::KeyListResponse,
            // Webhooks
            api::webhooks::RetryPolicyBody,
            api::webhooks::WebhookSummary,
            api::webhooks::CreateWebhookRequest,
            api::webhooks::CreateWebhookResponse,
            api::webhooks::UpdateWebhookRequest,
            api::webhooks::TestWebhookRequest,
            api::webhooks::TestWebhookResponse,
            api::webhooks::DeliverySummary,
            api::webhooks::DeliveryListResponse,
            // Admin
            api::admin::AdminSummary,
            api::admin::TotpAdminRequest,
            api::admin::GenerateTotpResponse,
            api::admin::EnableTotpRequest,
            api::admin::SuccessResponse,
            api::admin::SendCodeRequest,
            api::admin::VerifyCodeRequest,
            api::admin::VerifyCodeResponse,
        )
    ),
    tags(
        (name = "Health", description = "Service health and readiness"),
        (name = "API Keys", description = "API key create, rotate, revoke, verify"),
        (name = "Webhooks", description = "Webhook registration and signed delivery"),
        (name = "Admin", description = "Admin TOTP enrollment and email-code login")
    )
)]
pub struct ApiDoc;
