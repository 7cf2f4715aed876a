//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260210_000001_create_organizations;
mod m20260210_000002_create_environments;
mod m20260210_000003_create_api_keys;
mod m20260210_000004_create_webhooks;
mod m20260210_000005_create_webhook_deliveries;
mod m20260210_000006_create_admin_users;
mod m20260210_000007_create_admin_codes_sessions;
mod m20260210_000008_create_audit_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260210_000001_create_organizations::Migration),
            Box::new(m20260210_000002_create_environments::Migration),
            Box::new(m20260210_000003_create_api_keys::Migration),
            Box::new(m20260210_000004_create_webhooks::Migration),
            Box::new(m20260210_000005_create_webhook_deliveries::Migration),
            Box::new(m20260210_000006_create_admin_users::Migration),
            Box::new(m20260210_000007_create_admin_codes_sessions::Migration),
            Box::new(m20260210_000008_create_audit_log::Migration),
        ]
    }
}
