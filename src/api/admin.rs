//! Admin console endpoints: TOTP enrollment and email-code login.

use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::db::SharedStore;
use crate::error::AppResult;
use crate::models::AdminUser;
use crate::services::admin_auth;
use crate::services::email::Mailer;

/// Admin record as exposed over the wire. The TOTP secret never leaves the
/// server through this type.
#[derive(Serialize, ToSchema)]
pub struct AdminSummary {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub totp_enabled: bool,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl From<&AdminUser> for AdminSummary {
    fn from(admin: &AdminUser) -> Self {
        Self {
            id: admin.id,
            email: admin.email.clone(),
            role: admin.role.clone(),
            totp_enabled: admin.totp_enabled,
            created_at: admin.created_at.to_rfc3339(),
            last_login_at: admin.last_login_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Request body identifying the admin for TOTP operations.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TotpAdminRequest {
    pub admin_id: Uuid,
    pub email: String,
}

/// Fresh enrollment material; nothing is persisted until enable.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTotpResponse {
    pub secret: String,
    pub otpauth_uri: String,
    /// SVG QR code as a `data:image/svg+xml;base64,` URL
    pub qr_code: String,
}

/// Request body proving possession of the enrollment secret.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnableTotpRequest {
    pub admin_id: Uuid,
    pub email: String,
    pub secret: String,
    pub code: String,
}

#[derive(Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Request body for issuing a login code.
#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SendCodeRequest {
    pub email: String,
}

/// Request body exchanging a login code for a session.
#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

/// Issued session. The raw token appears only here.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    pub token: String,
    pub admin: AdminSummary,
    pub expires_at: String,
}

/// Configure admin routes.
pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(generate_totp)
        .service(enable_totp)
        .service(disable_totp)
        .service(send_code)
        .service(verify_code);
}

/// Start TOTP enrollment: mint a secret and QR code.
///
/// POST /admin/totp/generate
#[utoipa::path(
    post,
    path = "/api/v1/admin/totp/generate",
    tag = "Admin",
    request_body = TotpAdminRequest,
    responses(
        (status = 200, description = "Enrollment material; not yet persisted", body = GenerateTotpResponse),
        (status = 400, description = "Email does not match the admin record", body = crate::error::ErrorResponse),
        (status = 404, description = "Admin not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/admin/totp/generate")]
pub async fn generate_totp(
    store: web::Data<SharedStore>,
    config: web::Data<Config>,
    body: web::Json<TotpAdminRequest>,
) -> AppResult<HttpResponse> {
    let enrollment = admin_auth::generate_totp(
        store.get_ref().as_ref(),
        body.admin_id,
        &body.email,
        &config.totp_issuer,
    )
    .await?;

    Ok(HttpResponse::Ok().json(GenerateTotpResponse {
        secret: enrollment.secret,
        otpauth_uri: enrollment.otpauth_uri,
        qr_code: enrollment.qr_data_url,
    }))
}

/// Enable TOTP after verifying a code against the enrollment secret.
///
/// POST /admin/totp/enable
#[utoipa::path(
    post,
    path = "/api/v1/admin/totp/enable",
    tag = "Admin",
    request_body = EnableTotpRequest,
    responses(
        (status = 200, description = "TOTP enabled", body = SuccessResponse),
        (status = 400, description = "Invalid code", body = crate::error::ErrorResponse),
        (status = 404, description = "Admin not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/admin/totp/enable")]
pub async fn enable_totp(
    store: web::Data<SharedStore>,
    body: web::Json<EnableTotpRequest>,
) -> AppResult<HttpResponse> {
    admin_auth::enable_totp(
        store.get_ref().as_ref(),
        body.admin_id,
        &body.email,
        &body.secret,
        &body.code,
    )
    .await?;

    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

/// Disable TOTP and clear the stored secret.
///
/// POST /admin/totp/disable
#[utoipa::path(
    post,
    path = "/api/v1/admin/totp/disable",
    tag = "Admin",
    request_body = TotpAdminRequest,
    responses(
        (status = 200, description = "TOTP disabled", body = SuccessResponse),
        (status = 400, description = "Email does not match the admin record", body = crate::error::ErrorResponse),
        (status = 404, description = "Admin not found", body = crate::error::ErrorResponse)
    )
)]
#[post("/admin/totp/disable")]
pub async fn disable_totp(
    store: web::Data<SharedStore>,
    body: web::Json<TotpAdminRequest>,
) -> AppResult<HttpResponse> {
    admin_auth::disable_totp(store.get_ref().as_ref(), body.admin_id, &body.email).await?;

    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

/// Issue a 6-digit login code to an allow-listed admin email.
///
/// POST /admin/code/send
#[utoipa::path(
    post,
    path = "/api/v1/admin/code/send",
    tag = "Admin",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = SuccessResponse),
        (status = 403, description = "Email domain not allowed", body = crate::error::ErrorResponse)
    )
)]
#[post("/admin/code/send")]
pub async fn send_code(
    store: web::Data<SharedStore>,
    mailer: web::Data<Mailer>,
    config: web::Data<Config>,
    body: web::Json<SendCodeRequest>,
) -> AppResult<HttpResponse> {
    admin_auth::send_admin_code(
        store.get_ref().as_ref(),
        mailer.get_ref(),
        config.get_ref(),
        &body.email,
    )
    .await?;

    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

/// Exchange a pending login code for a 24-hour session.
///
/// POST /admin/code/verify
#[utoipa::path(
    post,
    path = "/api/v1/admin/code/verify",
    tag = "Admin",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Session issued; token is shown only here", body = VerifyCodeResponse),
        (status = 400, description = "Invalid or expired code", body = crate::error::ErrorResponse),
        (status = 403, description = "Email domain not allowed", body = crate::error::ErrorResponse)
    )
)]
#[post("/admin/code/verify")]
pub async fn verify_code(
    store: web::Data<SharedStore>,
    config: web::Data<Config>,
    body: web::Json<VerifyCodeRequest>,
) -> AppResult<HttpResponse> {
    let issued = admin_auth::verify_admin_code(
        store.get_ref().as_ref(),
        config.get_ref(),
        &body.email,
        &body.code,
    )
    .await?;

    Ok(HttpResponse::Ok().json(VerifyCodeResponse {
        token: issued.token,
        admin: AdminSummary::from(&issued.admin),
        expires_at: issued.expires_at.to_rfc3339(),
    }))
}
