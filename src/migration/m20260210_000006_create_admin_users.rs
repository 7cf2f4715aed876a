//! Migration: Create admin_users and admin_roles tables.

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
                CREATE TABLE admin_roles (
                    id UUID PRIMARY KEY,
                    name VARCHAR(50) NOT NULL UNIQUE,
                    description TEXT NOT NULL DEFAULT ''
                );

                CREATE TABLE admin_users (
                    id UUID PRIMARY KEY,
                    email VARCHAR(254) NOT NULL UNIQUE,
                    role VARCHAR(50) NOT NULL DEFAULT 'ops_admin',
                    totp_secret VARCHAR(64),
                    totp_enabled BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    last_login_at TIMESTAMPTZ,

                    -- secret may only be present while TOTP is enabled
                    CONSTRAINT chk_totp_secret_enabled
                        CHECK (totp_secret IS NULL OR totp_enabled)
                );
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP TABLE IF EXISTS admin_users CASCADE; DROP TABLE IF EXISTS admin_roles CASCADE;",
            )
            .await?;

        Ok(())
    }
}
