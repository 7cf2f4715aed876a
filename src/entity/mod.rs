//! SeaORM entity definitions for PostgreSQL database.

pub mod admin_role;
pub mod admin_session;
pub mod admin_user;
pub mod admin_verification_code;
pub mod api_key;
pub mod audit_log;
pub mod environment;
pub mod organization;
pub mod webhook;
pub mod webhook_delivery;
