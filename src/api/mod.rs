//! API endpoint modules.

pub mod admin;
pub mod api_keys;
pub mod health;
pub mod openapi;
pub mod webhooks;

pub use admin::configure_admin_routes;
pub use api_keys::configure_key_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use webhooks::configure_webhook_routes;
