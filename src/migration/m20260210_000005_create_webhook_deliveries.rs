//! Migration: Create webhook_deliveries table.
//!
//! Append-only delivery log. Rows are removed with their parent webhook
//! (cascade delete), keeping no orphaned history.

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
                CREATE TABLE webhook_deliveries (
                    id UUID PRIMARY KEY,
                    webhook_id UUID NOT NULL REFERENCES webhooks(id) ON DELETE CASCADE,
                    event_type VARCHAR(100) NOT NULL,
                    payload JSONB NOT NULL,
                    response_status INTEGER NOT NULL,
                    response_time_ms BIGINT NOT NULL,
                    attempt_number INTEGER NOT NULL DEFAULT 1,
                    delivered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_webhook_deliveries_webhook
                    ON webhook_deliveries(webhook_id, delivered_at DESC);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS webhook_deliveries CASCADE;")
            .await?;

        Ok(())
    }
}
