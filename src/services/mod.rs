//! Business logic services.

pub mod admin_auth;
pub mod api_key;
pub mod cleanup;
pub mod email;
pub mod secrets;
pub mod totp;
pub mod webhook;
