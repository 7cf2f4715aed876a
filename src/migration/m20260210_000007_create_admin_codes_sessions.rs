//! Migration: Create admin_verification_codes and admin_sessions tables.

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
                CREATE TABLE admin_verification_codes (
                    id UUID PRIMARY KEY,
                    email VARCHAR(254) NOT NULL,
                    code_hash VARCHAR(64) NOT NULL,
                    expires_at TIMESTAMPTZ NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- one live code per email
                CREATE UNIQUE INDEX idx_admin_codes_email ON admin_verification_codes(email);

                CREATE TABLE admin_sessions (
                    id UUID PRIMARY KEY,
                    admin_id UUID NOT NULL REFERENCES admin_users(id) ON DELETE CASCADE,
                    token_hash VARCHAR(64) NOT NULL UNIQUE,
                    expires_at TIMESTAMPTZ NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_admin_sessions_admin ON admin_sessions(admin_id);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP TABLE IF EXISTS admin_sessions CASCADE; DROP TABLE IF EXISTS admin_verification_codes CASCADE;",
            )
            .await?;

        Ok(())
    }
}
