//! Migration: Create webhooks table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE webhooks (
                    id UUID PRIMARY KEY,
                    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                    environment_id UUID NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
                    endpoint_url TEXT NOT NULL,
                    event_types TEXT NOT NULL,
                    signing_secret VARCHAR(80) NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    retry_max_attempts INTEGER NOT NULL DEFAULT 3,
                    retry_backoff_secs BIGINT NOT NULL DEFAULT 60,
                    success_count BIGINT NOT NULL DEFAULT 0,
                    failure_count BIGINT NOT NULL DEFAULT 0,
                    last_triggered_at TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_webhooks_org ON webhooks(organization_id);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS webhooks CASCADE;")
            .await?;

        Ok(())
    }
}
