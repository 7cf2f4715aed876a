//! API key lifecycle endpoints.
//!
//! The plaintext secret appears in exactly one response: the create or rotate
//! call that minted it. Every later read returns the masked record.

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::ApiKeyAuth;
use crate::db::SharedStore;
use crate::error::AppResult;
use crate::models::ApiKey;
use crate::services::api_key;

/// Masked API key record for responses. Field names follow the public
/// contract; the full secret and its hash are never included.
#[derive(Serialize, ToSchema)]
pub struct ApiKeySummary {
    pub id: Uuid,
    pub key_name: String,
    pub key_prefix: String,
    /// Last 4 characters of the secret, for display
    pub key_secret_partial: String,
    pub scopes: Vec<String>,
    pub is_active: bool,
    pub created_at: String,
    pub revoked_at: Option<String>,
}

impl From<&ApiKey> for ApiKeySummary {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id,
            key_name: key.name.clone(),
            key_prefix: key.key_prefix.secret_prefix().to_string(),
            key_secret_partial: key.key_secret_last4.clone(),
            scopes: key.scopes.iter().map(|s| s.to_string()).collect(),
            is_active: key.is_active,
            created_at: key.created_at.to_rfc3339(),
            revoked_at: key.revoked_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Request body for creating an API key.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateKeyRequest {
    pub organization_id: Uuid,
    pub environment_id: Uuid,
    pub key_name: String,
    pub scopes: Vec<String>,
}

/// Response carrying the full plaintext key, returned exactly once.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyResponse {
    pub full_key: String,
    pub api_key: ApiKeySummary,
}

/// Request body for rotating an API key.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RotateKeyRequest {
    pub key_id: Uuid,
    pub organization_id: Uuid,
}

/// Response carrying the replacement plaintext key, returned exactly once.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RotateKeyResponse {
    pub new_key: String,
    pub api_key: ApiKeySummary,
}

/// Request body for revoking an API key.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RevokeKeyRequest {
    pub key_id: Uuid,
    pub organization_id: Uuid,
    pub revoked_by: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Key list response.
#[derive(Serialize, ToSchema)]
pub struct KeyListResponse {
    pub api_keys: Vec<ApiKeySummary>,
}

/// Configure API key routes.
pub fn configure_key_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_key)
        .service(rotate_key)
        .service(revoke_key)
        .service(list_keys)
        .service(verify_caller);
}

/// Create a new API key.
///
/// POST /keys
#[utoipa::path(
    post,
    path = "/api/v1/keys",
    tag = "API Keys",
    request_body = CreateKeyRequest,
    responses(
        (status = 200, description = "Key created; fullKey is shown only here", body = CreateKeyResponse),
        (status = 400, description = "Invalid scopes or missing fields", body = crate::error::ErrorResponse),
        (status = 404, description = "Environment not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/keys")]
pub async fn create_key(
    store: web::Data<SharedStore>,
    body: web::Json<CreateKeyRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let (full_key, key) = api_key::create_key(
        store.get_ref().as_ref(),
        req.organization_id,
        req.environment_id,
        &req.key_name,
        &req.scopes,
    )
    .await?;

    Ok(HttpResponse::Ok().json(CreateKeyResponse {
        full_key,
        api_key: ApiKeySummary::from(&key),
    }))
}

/// Rotate an API key: revoke the old one and mint a replacement.
///
/// POST /keys/rotate
#[utoipa::path(
    post,
    path = "/api/v1/keys/rotate",
    tag = "API Keys",
    request_body = RotateKeyRequest,
    responses(
        (status = 200, description = "Key rotated; newKey is shown only here", body = RotateKeyResponse),
        (status = 400, description = "Key already revoked", body = crate::error::ErrorResponse),
        (status = 404, description = "Key not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/keys/rotate")]
pub async fn rotate_key(
    store: web::Data<SharedStore>,
    body: web::Json<RotateKeyRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let (new_key, key) =
        api_key::rotate_key(store.get_ref().as_ref(), req.key_id, req.organization_id).await?;

    Ok(HttpResponse::Ok().json(RotateKeyResponse {
        new_key,
        api_key: ApiKeySummary::from(&key),
    }))
}

/// Revoke an API key (terminal; a revoked key cannot be rotated or restored).
///
/// POST /keys/revoke
#[utoipa::path(
    post,
    path = "/api/v1/keys/revoke",
    tag = "API Keys",
    request_body = RevokeKeyRequest,
    responses(
        (status = 200, description = "Key revoked", body = MessageResponse),
        (status = 400, description = "Key already revoked", body = crate::error::ErrorResponse),
        (status = 404, description = "Key not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/keys/revoke")]
pub async fn revoke_key(
    store: web::Data<SharedStore>,
    body: web::Json<RevokeKeyRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    api_key::revoke_key(
        store.get_ref().as_ref(),
        req.key_id,
        req.organization_id,
        &req.revoked_by,
    )
    .await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "API key revoked".to_string(),
    }))
}

/// List an organization's API keys, masked.
///
/// GET /keys/{organization_id}
#[utoipa::path(
    get,
    path = "/api/v1/keys/{organization_id}",
    tag = "API Keys",
    params(
        ("organization_id" = Uuid, Path, description = "Organization UUID")
    ),
    responses(
        (status = 200, description = "Masked key list", body = KeyListResponse)
    )
)]
#[get("/keys/{organization_id}")]
pub async fn list_keys(
    store: web::Data<SharedStore>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let keys = store.list_api_keys(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(KeyListResponse {
        api_keys: keys.iter().map(ApiKeySummary::from).collect(),
    }))
}

/// Echo the caller resolved from the presented API key.
///
/// GET /verify
#[utoipa::path(
    get,
    path = "/api/v1/verify",
    tag = "API Keys",
    responses(
        (status = 200, description = "Authenticated caller"),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse)
    ),
    security(
        ("api_key" = [])
    )
)]
#[get("/verify")]
pub async fn verify_caller(auth: ApiKeyAuth) -> HttpResponse {
    HttpResponse::Ok().json(auth.caller)
}
