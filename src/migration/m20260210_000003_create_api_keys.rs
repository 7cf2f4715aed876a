//! Migration: Create api_keys table.
//!
//! Keys are stored as SHA-256 digests plus the last four characters of the
//! plaintext. Revocation is terminal: revoked_at is only ever set once.

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
                CREATE TABLE api_keys (
                    id UUID PRIMARY KEY,
                    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                    environment_id UUID NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
                    name VARCHAR(100) NOT NULL,
                    key_prefix VARCHAR(8) NOT NULL
                        CHECK (key_prefix IN ('live', 'test')),
                    key_hash VARCHAR(64) NOT NULL,
                    key_secret_last4 VARCHAR(4) NOT NULL,
                    scopes TEXT NOT NULL,
                    rate_limit_per_minute INTEGER NOT NULL DEFAULT 60,
                    rate_limit_per_day INTEGER NOT NULL DEFAULT 10000,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    revoked_at TIMESTAMPTZ,
                    revoked_by VARCHAR(200)
                );

                -- Unique constraint on key_hash for active keys only
                CREATE UNIQUE INDEX idx_api_keys_key_hash_active
                    ON api_keys(key_hash)
                    WHERE revoked_at IS NULL;

                CREATE INDEX idx_api_keys_org ON api_keys(organization_id);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS api_keys CASCADE;")
            .await?;

        Ok(())
    }
}
