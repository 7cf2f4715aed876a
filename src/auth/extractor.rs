//! Actix-web extractor for API key authentication.
//!
//! # Security
//! - The presented API key is wrapped in `SecretString` immediately
//! - Secret values are never logged or exposed in debug output
//! - Memory is zeroized when secrets are dropped
//! - Keys are compared by SHA-256 digest lookup, not raw value

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use futures_util::future::LocalBoxFuture;
use secrecy::{ExposeSecret, SecretString};

use crate::config::API_KEY_HEADER;
use crate::db::SharedStore;
use crate::error::ErrorResponse;
use crate::models::AuthenticatedCaller;
use crate::services::api_key;

/// Extract a secret header value, wrapping it in SecretString.
/// Returns None if the header is missing or invalid UTF-8.
fn extract_secret_header(req: &HttpRequest, header_name: &str) -> Option<SecretString> {
    req.headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(|s| SecretString::from(s.to_string()))
}

/// Authentication error for extractors.
#[derive(Debug)]
pub struct AuthError {
    message: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::UNAUTHORIZED).json(ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: self.message.clone(),
        })
    }
}

/// Extractor that requires a valid API key.
///
/// Use this in handlers that require authentication:
/// ```ignore
/// async fn protected_handler(auth: ApiKeyAuth) -> impl Responder {
///     // auth.caller contains the authenticated caller info
/// }
/// ```
pub struct ApiKeyAuth {
    pub caller: AuthenticatedCaller,
}

impl FromRequest for ApiKeyAuth {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let store = req.app_data::<web::Data<SharedStore>>().cloned();

        // Extract the secret from the header before the future detaches
        // from the request.
        let provided: Option<SecretString> = extract_secret_header(req, API_KEY_HEADER);

        Box::pin(async move {
            let store = store.ok_or_else(|| AuthError {
                message: "Internal configuration error".to_string(),
            })?;

            let key = provided.ok_or_else(|| AuthError {
                message: format!("Missing API key. Provide {} header.", API_KEY_HEADER),
            })?;

            // expose_secret() is the only way to access the value; the key is
            // dropped (and zeroized) when this future completes.
            api_key::verify_key(store.get_ref().as_ref(), key.expose_secret())
                .await
                .map(|caller| ApiKeyAuth { caller })
                .map_err(|e| AuthError {
                    message: e.to_string(),
                })
        })
    }
}
