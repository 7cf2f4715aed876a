//! Webhook entity.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "webhooks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub environment_id: Uuid,
    pub endpoint_url: String,
    /// Comma-joined event type subscriptions
    pub event_types: String,
    pub signing_secret: String,
    pub is_active: bool,
    pub retry_max_attempts: i32,
    pub retry_backoff_secs: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_triggered_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
